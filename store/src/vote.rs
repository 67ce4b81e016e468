//! Vote ledger trait.

use crate::StoreError;
use vigil_types::{AccountId, TxHash, Vote};

/// Durable table of `(poll, voter)` → vote.
///
/// At most one vote exists per pair. Votes are only ever removed when the
/// block that contained them is popped off.
pub trait VoteStore {
    /// Record a vote. Fails with [`StoreError::Duplicate`] if the voter already
    /// voted on this poll; the existing vote is left untouched.
    fn insert_vote(&self, vote: &Vote) -> Result<(), StoreError>;

    fn get_vote(&self, poll: &TxHash, voter: &AccountId) -> Result<Option<Vote>, StoreError>;

    /// All votes on a poll, ascending by voter.
    fn votes_for_poll(&self, poll: &TxHash) -> Result<Vec<Vote>, StoreError>;

    /// Remove a single vote. Returns whether it existed.
    fn delete_vote(&self, poll: &TxHash, voter: &AccountId) -> Result<bool, StoreError>;

    /// `(poll, voter)` pairs of votes contained in the block at `height`.
    fn votes_cast_at(&self, height: u64) -> Result<Vec<(TxHash, AccountId)>, StoreError>;

    /// Number of votes on a poll.
    fn vote_count(&self, poll: &TxHash) -> Result<u64, StoreError> {
        self.votes_for_poll(poll).map(|v| v.len() as u64)
    }
}
