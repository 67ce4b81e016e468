//! Consensus constants bounding polls.
//!
//! Every node on a network must run with identical values, otherwise poll
//! registration diverges.

use serde::{Deserialize, Serialize};

/// Limits enforced when registering a poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasingParams {
    /// Maximum distance, in blocks, between registration and finish height.
    #[serde(default = "default_max_finish_horizon")]
    pub max_finish_horizon: u64,

    /// Maximum number of accounts in a poll's whitelist.
    #[serde(default = "default_max_whitelist_size")]
    pub max_whitelist_size: usize,

    /// Maximum number of linked transactions for TRANSACTION_APPROVAL polls.
    #[serde(default = "default_max_linked_hashes")]
    pub max_linked_hashes: usize,
}

impl PhasingParams {
    /// Blocks per day at the one-minute target block time.
    pub const BLOCKS_PER_DAY: u64 = 1440;
}

fn default_max_finish_horizon() -> u64 {
    14 * PhasingParams::BLOCKS_PER_DAY // two weeks
}

fn default_max_whitelist_size() -> usize {
    10
}

fn default_max_linked_hashes() -> usize {
    10
}

impl Default for PhasingParams {
    fn default() -> Self {
        Self {
            max_finish_horizon: default_max_finish_horizon(),
            max_whitelist_size: default_max_whitelist_size(),
            max_linked_hashes: default_max_linked_hashes(),
        }
    }
}
