//! Poll store trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use vigil_types::{AccountId, Poll, PollStatus, TxHash};

/// A status change to write for one poll.
///
/// Used both for resolving (`Pending` → `Approved`/`Rejected`) and for undoing
/// a resolution (back to `Pending`, tally 0).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResolution {
    pub key: TxHash,
    pub status: PollStatus,
    pub tally: u64,
}

/// Durable table of polls keyed by the hash of the transaction they gate.
///
/// Besides the primary key, backends maintain three secondary indexes:
/// finish height, submitting account and creation height. Index scans
/// return polls in ascending hash order.
pub trait PollStore {
    /// Insert a new poll. Fails with [`StoreError::Duplicate`] if the key exists.
    fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError>;

    /// Look up a poll by the hash of its gated transaction.
    fn get_poll(&self, key: &TxHash) -> Result<Option<Poll>, StoreError>;

    /// Remove a poll and its index entries. Returns whether it existed.
    fn delete_poll(&self, key: &TxHash) -> Result<bool, StoreError>;

    /// All polls (any status) finishing at `height`, ascending by hash.
    fn polls_by_finish_height(&self, height: u64) -> Result<Vec<Poll>, StoreError>;

    /// All polls submitted by `account`, ascending by hash.
    fn polls_by_account(&self, account: &AccountId) -> Result<Vec<Poll>, StoreError>;

    /// Keys of polls registered by the block at `height`, ascending.
    fn polls_created_at(&self, height: u64) -> Result<Vec<TxHash>, StoreError>;

    /// Write every status change in `updates` atomically: either all of them
    /// are persisted or none is. Every key must refer to an existing poll.
    fn apply_resolutions(&self, updates: &[PollResolution]) -> Result<(), StoreError>;

    /// Total number of polls stored.
    fn poll_count(&self) -> Result<u64, StoreError>;

    /// Pending polls finishing at `height`.
    fn pending_by_finish_height(&self, height: u64) -> Result<Vec<Poll>, StoreError> {
        let mut polls = self.polls_by_finish_height(height)?;
        polls.retain(|p| p.is_pending());
        Ok(polls)
    }

    /// Pending polls submitted by `account`.
    fn pending_by_account(&self, account: &AccountId) -> Result<Vec<Poll>, StoreError> {
        let mut polls = self.polls_by_account(account)?;
        polls.retain(|p| p.is_pending());
        Ok(polls)
    }
}
