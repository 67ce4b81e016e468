//! Nullable infrastructure for deterministic testing.
//!
//! All external dependencies of the engine (poll store, vote ledger, account
//! ledger) are abstracted behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod ledger;
pub mod store;

pub use ledger::{NullLedger, Transfer};
pub use store::{NullPollStore, NullVoteStore};
