//! Conditional finality for phased transactions.
//!
//! A phased transaction is held back until a poll among eligible accounts
//! approves it by a deadline height. This crate owns the poll lifecycle:
//!
//! - **Weight model**: what a voter's approval is worth at a given height.
//! - **Registrar**: validates and stores polls as their transactions land.
//! - **Collector**: validates and records votes.
//! - **Resolver**: decides every poll at its finish height, releases the
//!   approved transactions, and inverts all of it when a block is popped off.
//!
//! Every decision is a pure function of chain state at fixed heights, so any
//! two nodes replaying the same blocks reach the same outcomes.

pub mod collector;
pub mod engine;
pub mod error;
pub mod registrar;
pub mod resolver;
pub mod weight;

pub use collector::{RejectReason, VoteCollector, VoteOutcome};
pub use engine::PhasingEngine;
pub use error::{ConsistencyError, PhasingError, RegistrationError};
pub use registrar::{PollRegistrar, PollRequest};
pub use resolver::{FinalityResolver, ResolvedPoll};
pub use weight::{Eligibility, IneligibleReason, VoterCriteria, WeightModel};
