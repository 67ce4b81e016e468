//! The conditional-finality engine: one handle over registration, voting,
//! resolution and the read-only queries exposed to the rest of the node.

use std::sync::Arc;

use vigil_ledger::LedgerView;
use vigil_store::{PollStore, VoteStore};
use vigil_types::{AccountId, PhasingParams, Poll, TxHash, Vote};

use crate::collector::{VoteCollector, VoteOutcome};
use crate::error::PhasingError;
use crate::registrar::{PollRegistrar, PollRequest};
use crate::resolver::{FinalityResolver, ResolvedPoll};

pub struct PhasingEngine {
    polls: Arc<dyn PollStore + Send + Sync>,
    votes: Arc<dyn VoteStore + Send + Sync>,
    registrar: PollRegistrar,
    collector: VoteCollector,
    resolver: FinalityResolver,
}

impl PhasingEngine {
    pub fn new(
        polls: Arc<dyn PollStore + Send + Sync>,
        votes: Arc<dyn VoteStore + Send + Sync>,
        ledger: Arc<dyn LedgerView + Send + Sync>,
        params: PhasingParams,
    ) -> Self {
        Self {
            registrar: PollRegistrar::new(polls.clone(), ledger.clone(), params),
            collector: VoteCollector::new(polls.clone(), votes.clone(), ledger.clone()),
            resolver: FinalityResolver::new(polls.clone(), votes.clone(), ledger),
            polls,
            votes,
        }
    }

    pub fn params(&self) -> &PhasingParams {
        self.registrar.params()
    }

    pub fn register(&self, request: PollRequest, current_height: u64) -> Result<Poll, PhasingError> {
        self.registrar.register(request, current_height)
    }

    pub fn cast_vote(
        &self,
        poll_key: &TxHash,
        voter: &AccountId,
        height: u64,
    ) -> Result<VoteOutcome, PhasingError> {
        self.collector.cast_vote(poll_key, voter, height)
    }

    pub fn resolve_height(&self, height: u64) -> Result<Vec<ResolvedPoll>, PhasingError> {
        self.resolver.resolve_height(height)
    }

    /// Undo resolutions made at `height`, then drop the votes and polls the
    /// block at `height` contained. The chain is left at `height - 1`.
    ///
    /// Registrations are checked before anything is written. If dropping the
    /// block's votes or polls fails after the undo, the undone resolutions are
    /// restored before the error is returned.
    pub fn pop_height(&self, height: u64) -> Result<Vec<ResolvedPoll>, PhasingError> {
        self.registrar.check_rollback_at(height)?;
        let reverted = self.resolver.undo_height(height)?;

        let rolled_back = self
            .collector
            .rollback_votes_at(height)
            .and_then(|_| self.registrar.rollback_registrations_at(height));
        if let Err(e) = rolled_back {
            tracing::error!(height, error = %e, "pop-off failed after undo, restoring resolutions");
            if let Err(restore) = self.resolver.restore(&reverted) {
                tracing::error!(height, error = %restore, "failed to restore resolutions");
            }
            return Err(e);
        }
        Ok(reverted)
    }

    pub fn registrar(&self) -> &PollRegistrar {
        &self.registrar
    }

    pub fn collector(&self) -> &VoteCollector {
        &self.collector
    }

    pub fn resolver(&self) -> &FinalityResolver {
        &self.resolver
    }

    pub fn get_poll(&self, key: &TxHash) -> Result<Option<Poll>, PhasingError> {
        Ok(self.polls.get_poll(key)?)
    }

    /// Votes on a poll, ascending by voter. Empty for an unknown poll.
    pub fn get_votes(&self, key: &TxHash) -> Result<Vec<Vote>, PhasingError> {
        Ok(self.votes.votes_for_poll(key)?)
    }

    pub fn list_pending_by_account(&self, account: &AccountId) -> Result<Vec<Poll>, PhasingError> {
        Ok(self.polls.pending_by_account(account)?)
    }

    pub fn list_pending_by_finish_height(&self, height: u64) -> Result<Vec<Poll>, PhasingError> {
        Ok(self.polls.pending_by_finish_height(height)?)
    }

    pub fn poll_count(&self) -> Result<u64, PhasingError> {
        Ok(self.polls.poll_count()?)
    }

    pub fn tally(&self, key: &TxHash) -> Result<u64, PhasingError> {
        self.collector.tally(key)
    }
}
