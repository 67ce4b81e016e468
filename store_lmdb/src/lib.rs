//! LMDB storage backend for the Vigil conditional-finality engine.
//!
//! Implements the storage traits from `vigil-store` using the `heed` LMDB bindings.
//! Each logical store maps to one or more LMDB databases within a single environment.

pub mod environment;
pub mod error;
mod keys;
pub mod poll;
pub mod vote;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use poll::LmdbPollStore;
pub use vote::LmdbVoteStore;
