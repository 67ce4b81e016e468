//! LMDB implementation of VoteStore.
//!
//! Two databases:
//! - `votes`: `poll_hash(32) ++ voter_be(8)` → bincode `Vote`. A prefix scan on
//!   the poll hash yields that poll's votes ordered by voter.
//! - `votes_by_height`: `height_be(8) ++ poll_hash(32) ++ voter_be(8)` → empty.
//!   Lets a popped-off block remove exactly the votes it contained.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use vigil_store::vote::VoteStore;
use vigil_store::StoreError;
use vigil_types::{AccountId, TxHash, Vote};

use crate::keys::{scan_prefix, split_vote_key, vote_height_key, vote_key};
use crate::LmdbError;

pub struct LmdbVoteStore {
    pub(crate) env: Arc<Env>,
    pub(crate) votes_db: Database<Bytes, Bytes>,
    pub(crate) votes_by_height_db: Database<Bytes, Bytes>,
}

impl VoteStore for LmdbVoteStore {
    fn insert_vote(&self, vote: &Vote) -> Result<(), StoreError> {
        let key = vote_key(&vote.poll, &vote.voter);
        let bytes = bincode::serialize(vote).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .votes_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!(
                "vote by {} on poll {}",
                vote.voter, vote.poll
            )));
        }
        self.votes_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.votes_by_height_db
            .put(&mut wtxn, &vote_height_key(vote.height, &vote.poll, &vote.voter), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_vote(&self, poll: &TxHash, voter: &AccountId) -> Result<Option<Vote>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .votes_db
            .get(&rtxn, &vote_key(poll, voter))
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn votes_for_poll(&self, poll: &TxHash) -> Result<Vec<Vote>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut votes = Vec::new();
        for (_, val) in scan_prefix(&self.votes_db, &rtxn, poll.as_bytes())? {
            votes.push(bincode::deserialize(&val).map_err(LmdbError::from)?);
        }
        Ok(votes)
    }

    fn delete_vote(&self, poll: &TxHash, voter: &AccountId) -> Result<bool, StoreError> {
        let key = vote_key(poll, voter);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let height = match self.votes_db.get(&wtxn, &key).map_err(LmdbError::from)? {
            Some(bytes) => bincode::deserialize::<Vote>(bytes)
                .map_err(LmdbError::from)?
                .height,
            None => return Ok(false),
        };
        self.votes_db
            .delete(&mut wtxn, &key)
            .map_err(LmdbError::from)?;
        self.votes_by_height_db
            .delete(&mut wtxn, &vote_height_key(height, poll, voter))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn votes_cast_at(&self, height: u64) -> Result<Vec<(TxHash, AccountId)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut pairs = Vec::new();
        for (key, _) in scan_prefix(&self.votes_by_height_db, &rtxn, &height.to_be_bytes())? {
            let suffix = key
                .get(8..)
                .ok_or_else(|| LmdbError::Serialization("vote height key too short".into()))?;
            pairs.push(split_vote_key(suffix)?);
        }
        Ok(pairs)
    }
}
