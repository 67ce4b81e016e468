//! Holdings a voter's weight or eligibility floor can be measured in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an asset or a currency issued on the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HoldingId(u64);

impl HoldingId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HoldingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of balance a ledger query refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldingKind {
    /// The chain's native unit. Carries no holding id.
    Native,
    Asset,
    Currency,
}
