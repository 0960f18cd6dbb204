//! Domain-separated BLAKE3 hashing.
//!
//! Every digest the protocol commits to is bound to a [`Domain`] through
//! BLAKE3's key-derivation mode. A submission message can therefore never be
//! replayed as a sortition input or a dedup hash, even over equal bytes.
//!
//! Digests over several fields use [`digest_fields`], which length-prefixes
//! each field before hashing.

use std::fmt;

/// The purposes a protocol digest can serve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    ProviderIdentity,
    SubmissionMessage,
    SubmissionDedup,
    SortitionInput,
    SortitionScore,
    EpochSeed,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::ProviderIdentity,
        Domain::SubmissionMessage,
        Domain::SubmissionDedup,
        Domain::SortitionInput,
        Domain::SortitionScore,
        Domain::EpochSeed,
    ];

    /// The BLAKE3 context string. Changing any of these forks the protocol.
    pub const fn context(self) -> &'static str {
        match self {
            Domain::ProviderIdentity => "fastfeed v1 provider-identity",
            Domain::SubmissionMessage => "fastfeed v1 submission-message",
            Domain::SubmissionDedup => "fastfeed v1 submission-dedup",
            Domain::SortitionInput => "fastfeed v1 sortition-input",
            Domain::SortitionScore => "fastfeed v1 sortition-score",
            Domain::EpochSeed => "fastfeed v1 epoch-seed",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.context())
    }
}

/// Unkeyed BLAKE3. Nothing on the wire uses it.
pub fn hash(data: &[u8]) -> [u8; 32] {
    ::blake3::hash(data).into()
}

/// Digest `material` in `domain`.
pub fn derive_key(domain: Domain, material: &[u8]) -> [u8; 32] {
    ::blake3::derive_key(domain.context(), material)
}

/// Digest a sequence of fields in `domain`. The fields are framed by
/// [`encode_multi_field`], so moving bytes between fields changes the digest.
pub fn digest_fields(domain: Domain, fields: &[&[u8]]) -> [u8; 32] {
    let mut hasher = ::blake3::Hasher::new_derive_key(domain.context());
    for field in fields {
        hasher.update(&frame_len(field));
        hasher.update(field);
    }
    hasher.finalize().into()
}

/// Frame each field as `LE32(len) || bytes` and concatenate.
pub fn encode_multi_field(fields: &[&[u8]]) -> Vec<u8> {
    fields.iter().fold(Vec::new(), |mut out, field| {
        out.extend_from_slice(&frame_len(field));
        out.extend_from_slice(field);
        out
    })
}

fn frame_len(field: &[u8]) -> [u8; 4] {
    // Fields are keys, counters and delta batches, all far below 4 GiB.
    (field.len() as u32).to_le_bytes()
}
