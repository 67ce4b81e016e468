//! LMDB implementation of PollStore.
//!
//! Four databases:
//! - `polls`: `tx_hash(32)` → bincode `Poll`.
//! - `polls_by_finish`: `finish_height_be(8) ++ tx_hash(32)` → empty.
//! - `polls_by_account`: `account_be(8) ++ tx_hash(32)` → empty.
//! - `polls_by_creation`: `created_height_be(8) ++ tx_hash(32)` → empty.
//!
//! A poll and its index entries are always written in the same transaction.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use vigil_store::poll::{PollResolution, PollStore};
use vigil_store::StoreError;
use vigil_types::{AccountId, Poll, TxHash};

use crate::keys::{account_hash_key, hash_suffix, height_hash_key, scan_prefix};
use crate::LmdbError;

pub struct LmdbPollStore {
    pub(crate) env: Arc<Env>,
    pub(crate) polls_db: Database<Bytes, Bytes>,
    pub(crate) polls_by_finish_db: Database<Bytes, Bytes>,
    pub(crate) polls_by_account_db: Database<Bytes, Bytes>,
    pub(crate) polls_by_creation_db: Database<Bytes, Bytes>,
}

impl LmdbPollStore {
    fn read_poll(&self, txn: &RoTxn, key: &TxHash) -> Result<Option<Poll>, LmdbError> {
        match self.polls_db.get(txn, key.as_bytes().as_slice())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    /// Resolve every hash found under `prefix` in `index` to its poll.
    fn polls_in_index(
        &self,
        index: &Database<Bytes, Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<Poll>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut polls = Vec::new();
        for (key, _) in scan_prefix(index, &rtxn, prefix)? {
            let hash = hash_suffix(&key)?;
            let poll = self
                .read_poll(&rtxn, &hash)?
                .ok_or_else(|| LmdbError::NotFound(format!("indexed poll {hash}")))?;
            polls.push(poll);
        }
        Ok(polls)
    }
}

impl PollStore for LmdbPollStore {
    fn insert_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let bytes = bincode::serialize(poll).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .polls_db
            .get(&wtxn, poll.key.as_bytes().as_slice())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("poll {}", poll.key)));
        }
        self.polls_db
            .put(&mut wtxn, poll.key.as_bytes().as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        self.polls_by_finish_db
            .put(&mut wtxn, &height_hash_key(poll.finish_height, &poll.key), &[])
            .map_err(LmdbError::from)?;
        self.polls_by_account_db
            .put(&mut wtxn, &account_hash_key(&poll.account, &poll.key), &[])
            .map_err(LmdbError::from)?;
        self.polls_by_creation_db
            .put(&mut wtxn, &height_hash_key(poll.created_height, &poll.key), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_poll(&self, key: &TxHash) -> Result<Option<Poll>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_poll(&rtxn, key)?)
    }

    fn delete_poll(&self, key: &TxHash) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let Some(poll) = self.read_poll(&wtxn, key)? else {
            return Ok(false);
        };
        self.polls_db
            .delete(&mut wtxn, key.as_bytes().as_slice())
            .map_err(LmdbError::from)?;
        self.polls_by_finish_db
            .delete(&mut wtxn, &height_hash_key(poll.finish_height, key))
            .map_err(LmdbError::from)?;
        self.polls_by_account_db
            .delete(&mut wtxn, &account_hash_key(&poll.account, key))
            .map_err(LmdbError::from)?;
        self.polls_by_creation_db
            .delete(&mut wtxn, &height_hash_key(poll.created_height, key))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn polls_by_finish_height(&self, height: u64) -> Result<Vec<Poll>, StoreError> {
        Ok(self.polls_in_index(&self.polls_by_finish_db, &height.to_be_bytes())?)
    }

    fn polls_by_account(&self, account: &AccountId) -> Result<Vec<Poll>, StoreError> {
        Ok(self.polls_in_index(&self.polls_by_account_db, &account.to_be_bytes())?)
    }

    fn polls_created_at(&self, height: u64) -> Result<Vec<TxHash>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut keys = Vec::new();
        for (key, _) in scan_prefix(&self.polls_by_creation_db, &rtxn, &height.to_be_bytes())? {
            keys.push(hash_suffix(&key)?);
        }
        Ok(keys)
    }

    fn apply_resolutions(&self, updates: &[PollResolution]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for update in updates {
            // Returning early drops `wtxn`, which aborts every earlier write.
            let mut poll = self
                .read_poll(&wtxn, &update.key)?
                .ok_or_else(|| StoreError::NotFound(format!("poll {}", update.key)))?;
            poll.status = update.status;
            poll.tally = update.tally;
            let bytes = bincode::serialize(&poll).map_err(LmdbError::from)?;
            self.polls_db
                .put(&mut wtxn, update.key.as_bytes().as_slice(), &bytes)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::trace!(count = updates.len(), "persisted poll resolutions");
        Ok(())
    }

    fn poll_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.polls_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
