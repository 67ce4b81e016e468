//! Abstract storage traits for polls and votes.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod error;
pub mod poll;
pub mod vote;

pub use error::StoreError;
pub use poll::{PollResolution, PollStore};
pub use vote::VoteStore;
