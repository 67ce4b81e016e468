//! The finality resolver.
//!
//! Driven once per applied block: every pending poll finishing at the new
//! height is decided, approved transactions are released through the ledger,
//! and the new statuses are written in one batch. Popping the block off runs
//! the exact inverse.
//!
//! Outcomes never depend on the order polls are visited in. Transaction
//! approval polls are decided by iterating to a fixed point over the
//! outcomes of this height and the durable outcomes of earlier heights.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use vigil_ledger::LedgerView;
use vigil_store::{PollResolution, PollStore, VoteStore};
use vigil_types::{AccountId, Poll, PollStatus, TxHash, VotingModel};

use crate::collector::sum_weights;
use crate::error::{ConsistencyError, PhasingError};

/// A poll whose status changed at `height`, either by resolution or by undo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPoll {
    pub key: TxHash,
    pub account: AccountId,
    /// The resolved status. For an undo, the status that was reverted.
    pub status: PollStatus,
    pub tally: u64,
    pub height: u64,
}

pub struct FinalityResolver {
    polls: Arc<dyn PollStore + Send + Sync>,
    votes: Arc<dyn VoteStore + Send + Sync>,
    ledger: Arc<dyn LedgerView + Send + Sync>,
}

/// State of a linked poll while resolving a transaction approval poll.
enum LinkState {
    Approved,
    NotApproved,
    Undecided,
}

impl FinalityResolver {
    pub fn new(
        polls: Arc<dyn PollStore + Send + Sync>,
        votes: Arc<dyn VoteStore + Send + Sync>,
        ledger: Arc<dyn LedgerView + Send + Sync>,
    ) -> Self {
        Self {
            polls,
            votes,
            ledger,
        }
    }

    /// Resolve every poll finishing at `height`, which was just applied.
    ///
    /// Returns the resolved polls in ascending hash order. On error nothing
    /// is persisted and every release made for this height has been undone.
    pub fn resolve_height(&self, height: u64) -> Result<Vec<ResolvedPoll>, PhasingError> {
        let polls = self.polls.polls_by_finish_height(height)?;
        if let Some(resolved) = polls.iter().find(|p| !p.is_pending()) {
            return Err(fatal(ConsistencyError::DoubleResolution {
                poll: resolved.key,
                height,
            }));
        }
        if polls.is_empty() {
            return Ok(Vec::new());
        }

        let outcomes = self.decide(&polls, height)?;
        let approved: Vec<TxHash> = outcomes
            .iter()
            .filter(|(_, (status, _))| *status == PollStatus::Approved)
            .map(|(key, _)| *key)
            .collect();

        self.release_all(&approved)?;

        let updates: Vec<PollResolution> = outcomes
            .iter()
            .map(|(key, (status, tally))| PollResolution {
                key: *key,
                status: *status,
                tally: *tally,
            })
            .collect();
        if let Err(e) = self.polls.apply_resolutions(&updates) {
            tracing::error!(height, error = %e, "failed to persist resolutions, undoing releases");
            self.undo_releases(approved.iter().rev());
            return Err(e.into());
        }

        let mut resolved: Vec<ResolvedPoll> = polls
            .iter()
            .filter_map(|p| {
                outcomes.get(&p.key).map(|(status, tally)| ResolvedPoll {
                    key: p.key,
                    account: p.account,
                    status: *status,
                    tally: *tally,
                    height,
                })
            })
            .collect();
        resolved.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        for r in &resolved {
            tracing::info!(poll = %r.key, height, status = ?r.status, tally = r.tally, "poll resolved");
        }
        Ok(resolved)
    }

    /// Undo the resolutions made at `height`, which is being popped off.
    ///
    /// Releases are undone in descending hash order, then every poll is reset
    /// to pending in one batch. Returns the reverted polls in that order.
    /// On error the height is left as it was: releases already undone are
    /// applied again and no status is written.
    pub fn undo_height(&self, height: u64) -> Result<Vec<ResolvedPoll>, PhasingError> {
        let mut resolved: Vec<Poll> = self
            .polls
            .polls_by_finish_height(height)?
            .into_iter()
            .filter(|p| p.status.is_resolved())
            .collect();
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        resolved.sort_unstable_by(|a, b| b.key.cmp(&a.key));

        let mut undone: Vec<TxHash> = Vec::new();
        for poll in resolved.iter().filter(|p| p.status == PollStatus::Approved) {
            if let Err(e) = self.ledger.undo_release(&poll.key) {
                tracing::error!(poll = %poll.key, height, error = %e, "undo failed, re-releasing height");
                self.reapply_releases(undone.iter().rev());
                return Err(e.into());
            }
            undone.push(poll.key);
        }

        let updates: Vec<PollResolution> = resolved
            .iter()
            .map(|p| PollResolution {
                key: p.key,
                status: PollStatus::Pending,
                tally: 0,
            })
            .collect();
        if let Err(e) = self.polls.apply_resolutions(&updates) {
            tracing::error!(height, error = %e, "failed to persist undo, re-releasing height");
            self.reapply_releases(undone.iter().rev());
            return Err(e.into());
        }

        let reverted: Vec<ResolvedPoll> = resolved
            .into_iter()
            .map(|p| ResolvedPoll {
                key: p.key,
                account: p.account,
                status: p.status,
                tally: p.tally,
                height,
            })
            .collect();
        for r in &reverted {
            tracing::info!(poll = %r.key, height, status = ?r.status, "poll resolution reverted");
        }
        Ok(reverted)
    }

    /// Put back resolutions returned by [`undo_height`](Self::undo_height):
    /// re-apply the approved releases in ascending order and restore every
    /// status and tally in one batch.
    pub fn restore(&self, reverted: &[ResolvedPoll]) -> Result<(), PhasingError> {
        let mut approved: Vec<TxHash> = reverted
            .iter()
            .filter(|r| r.status == PollStatus::Approved)
            .map(|r| r.key)
            .collect();
        approved.sort_unstable();
        self.release_all(&approved)?;

        let updates: Vec<PollResolution> = reverted
            .iter()
            .map(|r| PollResolution {
                key: r.key,
                status: r.status,
                tally: r.tally,
            })
            .collect();
        if let Err(e) = self.polls.apply_resolutions(&updates) {
            self.undo_releases(approved.iter().rev());
            return Err(e.into());
        }
        Ok(())
    }

    /// Outcome and tally of every poll in `polls`, all pending at `height`.
    fn decide(
        &self,
        polls: &[Poll],
        height: u64,
    ) -> Result<BTreeMap<TxHash, (PollStatus, u64)>, PhasingError> {
        let mut outcomes = BTreeMap::new();
        let mut linked: Vec<&Poll> = Vec::new();

        for poll in polls {
            if poll.voting_model == VotingModel::TransactionApproval {
                linked.push(poll);
                continue;
            }
            let votes = self.votes.votes_for_poll(&poll.key)?;
            let tally = match poll.voting_model {
                VotingModel::None | VotingModel::Account => votes.len() as u64,
                _ => sum_weights(&poll.key, votes.iter().map(|v| v.weight)).inspect_err(|_| {
                    tracing::error!(poll = %poll.key, height, "tally overflow");
                })?,
            };
            let quorum = poll
                .quorum
                .ok_or_else(|| fatal(ConsistencyError::MalformedPoll(poll.key)))?;
            let status = if tally >= quorum {
                PollStatus::Approved
            } else {
                PollStatus::Rejected
            };
            outcomes.insert(poll.key, (status, tally));
        }

        let mut undecided: BTreeSet<TxHash> = linked.iter().map(|p| p.key).collect();
        loop {
            let mut progressed = false;
            for poll in &linked {
                if !undecided.contains(&poll.key) {
                    continue;
                }
                if let Some(status) = self.linked_outcome(poll, height, &outcomes, &undecided)? {
                    let tally = self.votes.vote_count(&poll.key)?;
                    outcomes.insert(poll.key, (status, tally));
                    undecided.remove(&poll.key);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        // What is left depends on itself through a cycle and can never be approved.
        for key in undecided {
            let tally = self.votes.vote_count(&key)?;
            tracing::debug!(poll = %key, height, "linked cycle, rejecting");
            outcomes.insert(key, (PollStatus::Rejected, tally));
        }
        Ok(outcomes)
    }

    /// Decide a transaction approval poll from its links, or `None` while
    /// some link finishing at this height is still undecided.
    fn linked_outcome(
        &self,
        poll: &Poll,
        height: u64,
        outcomes: &BTreeMap<TxHash, (PollStatus, u64)>,
        undecided: &BTreeSet<TxHash>,
    ) -> Result<Option<PollStatus>, PhasingError> {
        let mut all_approved = true;
        for link in &poll.linked_hashes {
            match self.link_state(poll, link, height, outcomes, undecided)? {
                LinkState::Approved => {}
                LinkState::NotApproved => return Ok(Some(PollStatus::Rejected)),
                LinkState::Undecided => all_approved = false,
            }
        }
        Ok(all_approved.then_some(PollStatus::Approved))
    }

    fn link_state(
        &self,
        poll: &Poll,
        link: &TxHash,
        height: u64,
        outcomes: &BTreeMap<TxHash, (PollStatus, u64)>,
        undecided: &BTreeSet<TxHash>,
    ) -> Result<LinkState, PhasingError> {
        if let Some((status, _)) = outcomes.get(link) {
            return Ok(match status {
                PollStatus::Approved => LinkState::Approved,
                _ => LinkState::NotApproved,
            });
        }
        if undecided.contains(link) {
            return Ok(LinkState::Undecided);
        }
        let Some(linked) = self.polls.get_poll(link)? else {
            return Err(fatal(ConsistencyError::MissingLinkedPoll {
                poll: poll.key,
                linked: *link,
            }));
        };
        match linked.status {
            PollStatus::Approved => Ok(LinkState::Approved),
            PollStatus::Rejected => Ok(LinkState::NotApproved),
            PollStatus::Pending if linked.finish_height < height => {
                Err(fatal(ConsistencyError::StalePending {
                    linked: *link,
                    finish_height: linked.finish_height,
                    height,
                }))
            }
            // Finishes later, so it is not approved at this height.
            PollStatus::Pending => Ok(LinkState::NotApproved),
        }
    }

    /// Apply releases in order; on failure undo the ones already applied.
    fn release_all(&self, approved: &[TxHash]) -> Result<(), PhasingError> {
        for (i, key) in approved.iter().enumerate() {
            if let Err(e) = self.ledger.apply_release(key) {
                tracing::error!(poll = %key, error = %e, "release failed, undoing height");
                self.undo_releases(approved[..i].iter().rev());
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn reapply_releases<'a>(&self, keys: impl Iterator<Item = &'a TxHash>) {
        for key in keys {
            if let Err(e) = self.ledger.apply_release(key) {
                tracing::error!(poll = %key, error = %e, "failed to re-apply release");
            }
        }
    }

    fn undo_releases<'a>(&self, keys: impl Iterator<Item = &'a TxHash>) {
        for key in keys {
            if let Err(e) = self.ledger.undo_release(key) {
                tracing::error!(poll = %key, error = %e, "failed to undo release");
            }
        }
    }
}

fn fatal(err: ConsistencyError) -> PhasingError {
    tracing::error!(error = %err, "consistency violation");
    err.into()
}
