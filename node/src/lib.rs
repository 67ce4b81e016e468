//! Vigil node integration for conditional finality.
//!
//! Wires the phasing engine to:
//! - the block processor, through [`IntegrationHook`] and [`ChainEvent`]s
//! - durable LMDB storage, opened from a [`PhasingConfig`]
//! - subscribers, through the synchronous [`EventBus`]

pub mod config;
pub mod error;
pub mod event;
pub mod hook;
pub mod logging;
pub mod node;

pub use config::PhasingConfig;
pub use error::NodeError;
pub use event::{ChainEvent, EventBus, PhasingEvent};
pub use hook::IntegrationHook;
pub use logging::{init_from_config, init_logging, LogFormat};
pub use node::VigilNode;
