//! Packed feed storage.
//!
//! Magnitudes live eight to a [`U256`] word (feed `i` is lane `i % 8` of word
//! `i / 8`); decimals live one byte per feed. Callers only ever see
//! [`Feed`] values through [`FeedStore::get`] and [`FeedStore::set`].
//!
//! Invariant: `8 × words.len() ≥ decimals.len()`.

use fastfeed_fpa::wide::{Lanes, LANES};
use fastfeed_fpa::U256;
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// One feed's current value: `magnitude / 10^decimals`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Position of the feed in the store.
    pub index: u32,
    /// Unscaled value, kept below `2^29` by normalization.
    pub magnitude: u32,
    /// Number of decimal places in `magnitude`.
    pub decimals: i8,
}

impl Feed {
    /// The decimal exponent of the value, i.e. `value = magnitude × 10^exponent`.
    pub fn exponent(&self) -> i16 {
        -i16::from(self.decimals)
    }

    /// Whether the feed has been removed (or never set).
    pub fn is_empty(&self) -> bool {
        self.magnitude == 0
    }
}

/// Packed array of feed magnitudes and decimals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStore {
    words: Vec<U256>,
    decimals: Vec<i8>,
}

impl FeedStore {
    /// Create a store holding `len` empty feeds.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![U256::zero(); len.div_ceil(LANES)],
            decimals: vec![0; len],
        }
    }

    /// Number of feeds the store can address.
    pub fn len(&self) -> usize {
        self.decimals.len()
    }

    /// Whether the store addresses no feeds.
    pub fn is_empty(&self) -> bool {
        self.decimals.is_empty()
    }

    /// Number of packed magnitude words.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Grow the store to address at least `len` feeds. Never shrinks.
    pub fn ensure_len(&mut self, len: usize) {
        if len <= self.decimals.len() {
            return;
        }
        self.decimals.resize(len, 0);
        self.words.resize(len.div_ceil(LANES), U256::zero());
    }

    /// Read one feed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfRange`] if `index` is not addressable
    pub fn get(&self, index: u32) -> Result<Feed> {
        let i = self.slot(index)?;
        Ok(Feed {
            index,
            magnitude: self.words[i / LANES].lane(i % LANES),
            decimals: self.decimals[i],
        })
    }

    /// Overwrite one feed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfRange`] if `index` is not addressable
    pub fn set(&mut self, index: u32, magnitude: u32, decimals: i8) -> Result<()> {
        let i = self.slot(index)?;
        self.words[i / LANES].set_lane(i % LANES, magnitude);
        self.decimals[i] = decimals;
        Ok(())
    }

    /// Logically delete a feed (magnitude 0, decimals 0).
    pub fn clear(&mut self, index: u32) -> Result<()> {
        self.set(index, 0, 0)
    }

    /// Read several feeds, failing on the first bad index.
    pub fn get_many(&self, indices: &[u32]) -> Result<Vec<Feed>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }

    /// Iterate all feeds in index order.
    pub fn iter(&self) -> impl Iterator<Item = Feed> + '_ {
        (0..self.len()).map(move |i| Feed {
            index: i as u32,
            magnitude: self.words[i / LANES].lane(i % LANES),
            decimals: self.decimals[i],
        })
    }

    /// Unpack word `word` into its magnitudes and decimals. Lanes past the
    /// end of the store read as zero.
    pub(crate) fn load_word(&self, word: usize) -> ([u32; LANES], [i8; LANES]) {
        let mut magnitudes = [0u32; LANES];
        let mut decimals = [0i8; LANES];
        let packed = self.words[word];
        for lane in 0..LANES {
            let i = word * LANES + lane;
            if i >= self.decimals.len() {
                break;
            }
            magnitudes[lane] = packed.lane(lane);
            decimals[lane] = self.decimals[i];
        }
        (magnitudes, decimals)
    }

    /// Pack `magnitudes` and `decimals` back into word `word`.
    pub(crate) fn store_word(&mut self, word: usize, magnitudes: &[u32; LANES], decimals: &[i8; LANES]) {
        let mut packed = U256::zero();
        for lane in 0..LANES {
            let i = word * LANES + lane;
            if i >= self.decimals.len() {
                break;
            }
            packed.set_lane(lane, magnitudes[lane]);
            self.decimals[i] = decimals[lane];
        }
        self.words[word] = packed;
    }

    fn slot(&self, index: u32) -> Result<usize> {
        let i = index as usize;
        if i >= self.decimals.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: self.decimals.len(),
            });
        }
        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = FeedStore::new(10);
        assert_eq!(store.len(), 10);
        assert_eq!(store.word_count(), 2);
        assert!(store.iter().all(|f| f.is_empty() && f.decimals == 0));
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut store = FeedStore::new(20);
        store.set(13, 123_456_789, 5).expect("in range");
        let feed = store.get(13).expect("in range");
        assert_eq!(feed.magnitude, 123_456_789);
        assert_eq!(feed.decimals, 5);
        assert_eq!(feed.exponent(), -5);
        // Neighbouring lanes are untouched.
        assert_eq!(store.get(12).expect("in range").magnitude, 0);
        assert_eq!(store.get(14).expect("in range").magnitude, 0);
    }

    #[test]
    fn test_negative_decimals() {
        let mut store = FeedStore::new(1);
        store.set(0, 42, -3).expect("in range");
        assert_eq!(store.get(0).expect("in range").decimals, -3);
    }

    #[test]
    fn test_out_of_range_is_error() {
        let mut store = FeedStore::new(8);
        assert_eq!(
            store.get(8),
            Err(StoreError::IndexOutOfRange { index: 8, len: 8 })
        );
        assert!(store.set(100, 1, 0).is_err());
        assert!(store.get_many(&[0, 1, 9]).is_err());
    }

    #[test]
    fn test_clear() {
        let mut store = FeedStore::new(3);
        store.set(1, 500, 2).expect("in range");
        store.clear(1).expect("in range");
        let feed = store.get(1).expect("in range");
        assert!(feed.is_empty());
        assert_eq!(feed.decimals, 0);
    }

    #[test]
    fn test_ensure_len_preserves_values() {
        let mut store = FeedStore::new(7);
        store.set(6, 77, 1).expect("in range");
        store.ensure_len(17);
        assert_eq!(store.len(), 17);
        assert_eq!(store.word_count(), 3);
        assert_eq!(store.get(6).expect("in range").magnitude, 77);
        store.ensure_len(5);
        assert_eq!(store.len(), 17);
    }

    #[test]
    fn test_word_load_store_roundtrip() {
        let mut store = FeedStore::new(11);
        for i in 0..11u32 {
            store.set(i, i * 1000 + 1, i as i8).expect("in range");
        }
        let (m, d) = store.load_word(1);
        assert_eq!(m[0], 8001);
        assert_eq!(m[2], 10_001);
        assert_eq!(m[3], 0);
        assert_eq!(d[1], 9);
        store.store_word(1, &m, &d);
        assert_eq!(store.get(10).expect("in range").magnitude, 10_001);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn packed_matches_unpacked_reference(
            len in 1usize..80,
            ops in proptest::collection::vec((any::<u32>(), any::<u32>(), any::<i8>()), 0..200),
        ) {
            let mut store = FeedStore::new(len);
            let mut reference = vec![(0u32, 0i8); len];
            for (raw_index, magnitude, decimals) in ops {
                let index = raw_index % len as u32;
                store.set(index, magnitude, decimals).expect("in range");
                reference[index as usize] = (magnitude, decimals);
            }
            for (i, (magnitude, decimals)) in reference.iter().enumerate() {
                let feed = store.get(i as u32).expect("in range");
                prop_assert_eq!(feed.magnitude, *magnitude);
                prop_assert_eq!(feed.decimals, *decimals);
            }
        }
    }
}
