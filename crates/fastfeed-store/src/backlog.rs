//! Bounded circular backlog of unmerged delta batches.
//!
//! Batches are addressed by a monotonically increasing sequence number; slot
//! `seq % capacity` holds batch `seq`. The read cursor is the oldest
//! unmerged sequence number and the write cursor the next one to assign.
//! A slot is only reused after the read cursor has passed it, so an
//! unmerged batch is never overwritten: a push into a full backlog fails.

use fastfeed_types::BACKLOG_CAPACITY;
use serde::{Deserialize, Serialize};

use crate::delta::DeltaBatch;
use crate::{Result, StoreError};

/// Fixed-capacity ring of pending delta batches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaBacklog {
    slots: Vec<Option<DeltaBatch>>,
    /// Oldest unmerged sequence number.
    read: u64,
    /// Next sequence number to assign.
    write: u64,
}

impl Default for DeltaBacklog {
    fn default() -> Self {
        Self::with_capacity(BACKLOG_CAPACITY)
    }
}

impl DeltaBacklog {
    /// Create an empty backlog holding at most `capacity` unmerged batches.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            read: 0,
            write: 0,
        }
    }

    /// Maximum number of unmerged batches.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of unmerged batches.
    pub fn pending_len(&self) -> usize {
        (self.write - self.read) as usize
    }

    /// Whether no batch is waiting to be merged.
    pub fn is_empty(&self) -> bool {
        self.write == self.read
    }

    /// Whether a push would fail.
    pub fn is_full(&self) -> bool {
        self.pending_len() >= self.capacity()
    }

    /// Total number of batches ever appended.
    pub fn total_appended(&self) -> u64 {
        self.write
    }

    /// Append a batch, returning its sequence number.
    ///
    /// # Errors
    ///
    /// - [`StoreError::BacklogFull`] if every slot holds an unmerged batch
    pub fn push(&mut self, batch: DeltaBatch) -> Result<u64> {
        if self.is_full() {
            tracing::warn!(capacity = self.capacity(), "delta backlog full");
            return Err(StoreError::BacklogFull {
                capacity: self.capacity(),
            });
        }
        let seq = self.write;
        let slot = self.slot(seq);
        self.slots[slot] = Some(batch);
        self.write += 1;
        Ok(seq)
    }

    /// Unmerged batches, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &DeltaBatch> + '_ {
        (self.read..self.write).filter_map(move |seq| self.slots[self.slot(seq)].as_ref())
    }

    /// Retire every pending batch after a merge. Returns how many were
    /// retired.
    pub fn retire_all(&mut self) -> usize {
        let retired = self.pending_len();
        for seq in self.read..self.write {
            let slot = self.slot(seq);
            self.slots[slot] = None;
        }
        self.read = self.write;
        retired
    }

    fn slot(&self, seq: u64) -> usize {
        (seq % self.slots.len() as u64) as usize
    }
}
