//! Vote collection for pending polls.

use std::sync::Arc;

use vigil_ledger::LedgerView;
use vigil_store::{PollStore, StoreError, VoteStore};
use vigil_types::{AccountId, TxHash, Vote};

use crate::error::{ConsistencyError, PhasingError};
use crate::weight::{Eligibility, IneligibleReason, WeightModel};

/// Result of casting a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was recorded with this captured weight.
    Accepted { weight: u64 },
    Rejected(RejectReason),
}

impl VoteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Why a vote was not admitted. Nothing is stored for a rejected vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    PollNotFound,
    AlreadyResolved,
    /// Cast at or after the poll's finish height.
    TooLate { finish_height: u64 },
    NotWhitelisted,
    AlreadyVoted,
    Ineligible(IneligibleReason),
}

pub struct VoteCollector {
    polls: Arc<dyn PollStore + Send + Sync>,
    votes: Arc<dyn VoteStore + Send + Sync>,
    weights: WeightModel,
}

impl VoteCollector {
    pub fn new(
        polls: Arc<dyn PollStore + Send + Sync>,
        votes: Arc<dyn VoteStore + Send + Sync>,
        ledger: Arc<dyn LedgerView + Send + Sync>,
    ) -> Self {
        Self {
            polls,
            votes,
            weights: WeightModel::new(ledger),
        }
    }

    /// Cast `voter`'s approval on `poll_key` in the block at `height`.
    ///
    /// Checks run in order: poll exists, still pending, not too late,
    /// whitelist, not already voted, eligibility. Only the weight query and
    /// the stores can produce an `Err`; every policy failure is a
    /// [`VoteOutcome::Rejected`].
    pub fn cast_vote(
        &self,
        poll_key: &TxHash,
        voter: &AccountId,
        height: u64,
    ) -> Result<VoteOutcome, PhasingError> {
        let outcome = self.try_cast(poll_key, voter, height)?;
        match outcome {
            VoteOutcome::Accepted { weight } => {
                tracing::debug!(poll = %poll_key, %voter, height, weight, "vote accepted");
            }
            VoteOutcome::Rejected(reason) => {
                tracing::debug!(poll = %poll_key, %voter, height, ?reason, "vote rejected");
            }
        }
        Ok(outcome)
    }

    fn try_cast(
        &self,
        poll_key: &TxHash,
        voter: &AccountId,
        height: u64,
    ) -> Result<VoteOutcome, PhasingError> {
        let Some(poll) = self.polls.get_poll(poll_key)? else {
            return Ok(VoteOutcome::Rejected(RejectReason::PollNotFound));
        };
        if !poll.is_pending() {
            return Ok(VoteOutcome::Rejected(RejectReason::AlreadyResolved));
        }
        if height >= poll.finish_height {
            return Ok(VoteOutcome::Rejected(RejectReason::TooLate {
                finish_height: poll.finish_height,
            }));
        }
        if !poll.admits(voter) {
            return Ok(VoteOutcome::Rejected(RejectReason::NotWhitelisted));
        }
        if self.votes.get_vote(poll_key, voter)?.is_some() {
            return Ok(VoteOutcome::Rejected(RejectReason::AlreadyVoted));
        }

        let weight = match self.weights.weight_for(&poll, voter, height)? {
            Eligibility::Eligible(weight) => weight,
            Eligibility::Ineligible(reason) => {
                return Ok(VoteOutcome::Rejected(RejectReason::Ineligible(reason)));
            }
        };

        let vote = Vote {
            poll: *poll_key,
            voter: *voter,
            weight,
            height,
        };
        match self.votes.insert_vote(&vote) {
            Ok(()) => Ok(VoteOutcome::Accepted { weight }),
            Err(StoreError::Duplicate(_)) => Ok(VoteOutcome::Rejected(RejectReason::AlreadyVoted)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the votes contained in the block at `height`, which is being
    /// popped off. Returns how many were removed.
    pub fn rollback_votes_at(&self, height: u64) -> Result<usize, PhasingError> {
        let cast = self.votes.votes_cast_at(height)?;
        let mut removed = 0;
        for (poll, voter) in &cast {
            if self.votes.delete_vote(poll, voter)? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(height, removed, "rolled back votes");
        }
        Ok(removed)
    }

    /// Current YES weight on a poll: the checked sum of captured weights.
    pub fn tally(&self, poll_key: &TxHash) -> Result<u64, PhasingError> {
        let votes = self.votes.votes_for_poll(poll_key)?;
        sum_weights(poll_key, votes.iter().map(|v| v.weight))
    }
}

/// Overflow-checked sum of vote weights.
pub(crate) fn sum_weights(
    poll_key: &TxHash,
    weights: impl IntoIterator<Item = u64>,
) -> Result<u64, PhasingError> {
    weights
        .into_iter()
        .try_fold(0u64, |acc, w| acc.checked_add(w))
        .ok_or_else(|| ConsistencyError::TallyOverflow(*poll_key).into())
}
