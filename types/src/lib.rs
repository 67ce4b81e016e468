//! Fundamental types for the Vigil conditional-finality engine.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! transaction hashes, account and holding identifiers, polls, votes, and the
//! consensus constants that bound them.

pub mod account;
pub mod hash;
pub mod holding;
pub mod params;
pub mod poll;

pub use account::AccountId;
pub use hash::TxHash;
pub use holding::{HoldingId, HoldingKind};
pub use params::PhasingParams;
pub use poll::{MinBalanceModel, Poll, PollStatus, Vote, VotingModel};
