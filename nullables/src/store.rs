//! Nullable stores: thread-safe in-memory poll store and vote ledger for testing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use vigil_store::poll::{PollResolution, PollStore};
use vigil_store::vote::VoteStore;
use vigil_store::StoreError;
use vigil_types::{AccountId, Poll, TxHash, Vote};

/// An in-memory poll store.
///
/// Polls are kept in a `BTreeMap` keyed by hash, so every scan is naturally
/// in ascending hash order like the LMDB indexes.
pub struct NullPollStore {
    polls: Mutex<BTreeMap<TxHash, Poll>>,
}

impl NullPollStore {
    pub fn new() -> Self {
        Self {
            polls: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of every stored poll, for state comparisons in tests.
    pub fn all_polls(&self) -> Vec<Poll> {
        self.polls.lock().unwrap().values().cloned().collect()
    }

    fn collect_where(&self, pred: impl Fn(&Poll) -> bool) -> Vec<Poll> {
        self.polls
            .lock()
            .unwrap()
            .values()
            .filter(|p| pred(p))
            .cloned()
            .collect()
    }
}

impl Default for NullPollStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PollStore for NullPollStore {
    fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let mut polls = self.polls.lock().unwrap();
        if polls.contains_key(&poll.key) {
            return Err(StoreError::Duplicate(format!("poll {}", poll.key)));
        }
        polls.insert(poll.key, poll.clone());
        Ok(())
    }

    fn get_poll(&self, key: &TxHash) -> Result<Option<Poll>, StoreError> {
        Ok(self.polls.lock().unwrap().get(key).cloned())
    }

    fn delete_poll(&self, key: &TxHash) -> Result<bool, StoreError> {
        Ok(self.polls.lock().unwrap().remove(key).is_some())
    }

    fn polls_by_finish_height(&self, height: u64) -> Result<Vec<Poll>, StoreError> {
        Ok(self.collect_where(|p| p.finish_height == height))
    }

    fn polls_by_account(&self, account: &AccountId) -> Result<Vec<Poll>, StoreError> {
        Ok(self.collect_where(|p| p.account == *account))
    }

    fn polls_created_at(&self, height: u64) -> Result<Vec<TxHash>, StoreError> {
        Ok(self
            .collect_where(|p| p.created_height == height)
            .into_iter()
            .map(|p| p.key)
            .collect())
    }

    fn apply_resolutions(&self, updates: &[PollResolution]) -> Result<(), StoreError> {
        let mut polls = self.polls.lock().unwrap();
        if let Some(missing) = updates.iter().find(|u| !polls.contains_key(&u.key)) {
            return Err(StoreError::NotFound(format!("poll {}", missing.key)));
        }
        for update in updates {
            if let Some(poll) = polls.get_mut(&update.key) {
                poll.status = update.status;
                poll.tally = update.tally;
            }
        }
        Ok(())
    }

    fn poll_count(&self) -> Result<u64, StoreError> {
        Ok(self.polls.lock().unwrap().len() as u64)
    }
}

/// An in-memory vote ledger.
pub struct NullVoteStore {
    votes: Mutex<BTreeMap<(TxHash, AccountId), Vote>>,
}

impl NullVoteStore {
    pub fn new() -> Self {
        Self {
            votes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of every stored vote, for state comparisons in tests.
    pub fn all_votes(&self) -> Vec<Vote> {
        self.votes.lock().unwrap().values().cloned().collect()
    }
}

impl Default for NullVoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteStore for NullVoteStore {
    fn insert_vote(&self, vote: &Vote) -> Result<(), StoreError> {
        let mut votes = self.votes.lock().unwrap();
        let key = (vote.poll, vote.voter);
        if votes.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "vote by {} on poll {}",
                vote.voter, vote.poll
            )));
        }
        votes.insert(key, vote.clone());
        Ok(())
    }

    fn get_vote(&self, poll: &TxHash, voter: &AccountId) -> Result<Option<Vote>, StoreError> {
        Ok(self.votes.lock().unwrap().get(&(*poll, *voter)).cloned())
    }

    fn votes_for_poll(&self, poll: &TxHash) -> Result<Vec<Vote>, StoreError> {
        Ok(self
            .votes
            .lock()
            .unwrap()
            .range((*poll, AccountId::new(0))..=(*poll, AccountId::new(u64::MAX)))
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn delete_vote(&self, poll: &TxHash, voter: &AccountId) -> Result<bool, StoreError> {
        Ok(self.votes.lock().unwrap().remove(&(*poll, *voter)).is_some())
    }

    fn votes_cast_at(&self, height: u64) -> Result<Vec<(TxHash, AccountId)>, StoreError> {
        Ok(self
            .votes
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.height == height)
            .map(|v| (v.poll, v.voter))
            .collect())
    }
}
