//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};

use crate::poll::LmdbPollStore;
use crate::vote::LmdbVoteStore;
use crate::LmdbError;

/// The schema version that the current code writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Number of named databases the environment needs.
pub const REQUIRED_DBS: u32 = 7;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    polls_db: Database<Bytes, Bytes>,
    polls_by_finish_db: Database<Bytes, Bytes>,
    polls_by_account_db: Database<Bytes, Bytes>,
    polls_by_creation_db: Database<Bytes, Bytes>,
    votes_db: Database<Bytes, Bytes>,
    votes_by_height_db: Database<Bytes, Bytes>,
    meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// `max_dbs` must be at least [`REQUIRED_DBS`].
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per path by this process and
        // the memory map is never accessed outside of heed transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(REQUIRED_DBS))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let polls_db = env.create_database(&mut wtxn, Some("polls"))?;
        let polls_by_finish_db = env.create_database(&mut wtxn, Some("polls_by_finish"))?;
        let polls_by_account_db = env.create_database(&mut wtxn, Some("polls_by_account"))?;
        let polls_by_creation_db = env.create_database(&mut wtxn, Some("polls_by_creation"))?;
        let votes_db = env.create_database(&mut wtxn, Some("votes"))?;
        let votes_by_height_db = env.create_database(&mut wtxn, Some("votes_by_height"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        check_schema_version(&meta_db, &mut wtxn)?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            polls_db,
            polls_by_finish_db,
            polls_by_account_db,
            polls_by_creation_db,
            votes_db,
            votes_by_height_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Handle implementing [`vigil_store::PollStore`] over this environment.
    pub fn poll_store(&self) -> LmdbPollStore {
        LmdbPollStore {
            env: Arc::clone(&self.env),
            polls_db: self.polls_db,
            polls_by_finish_db: self.polls_by_finish_db,
            polls_by_account_db: self.polls_by_account_db,
            polls_by_creation_db: self.polls_by_creation_db,
        }
    }

    /// Handle implementing [`vigil_store::VoteStore`] over this environment.
    pub fn vote_store(&self) -> LmdbVoteStore {
        LmdbVoteStore {
            env: Arc::clone(&self.env),
            votes_db: self.votes_db,
            votes_by_height_db: self.votes_by_height_db,
        }
    }

    /// The schema version recorded in the database.
    pub fn schema_version(&self) -> Result<u32, LmdbError> {
        let rtxn = self.env.read_txn()?;
        read_schema_version(&self.meta_db, &rtxn)
    }
}

fn read_schema_version(
    meta_db: &Database<Bytes, Bytes>,
    txn: &heed::RoTxn,
) -> Result<u32, LmdbError> {
    match meta_db.get(txn, SCHEMA_VERSION_KEY)? {
        Some(bytes) => {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                LmdbError::Serialization("schema_version has unexpected byte length".into())
            })?;
            Ok(u32::from_le_bytes(arr))
        }
        None => Ok(0),
    }
}

/// Stamp a fresh database with the current version and refuse databases
/// written by a newer node.
fn check_schema_version(
    meta_db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn,
) -> Result<(), LmdbError> {
    let found = read_schema_version(meta_db, &*wtxn)?;
    if found > CURRENT_SCHEMA_VERSION {
        return Err(LmdbError::SchemaTooNew {
            found,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if found < CURRENT_SCHEMA_VERSION {
        tracing::info!(from = found, to = CURRENT_SCHEMA_VERSION, "stamping schema version");
        meta_db.put(wtxn, SCHEMA_VERSION_KEY, &CURRENT_SCHEMA_VERSION.to_le_bytes())?;
    }
    Ok(())
}
