//! The account ledger as seen by the conditional-finality engine.
//!
//! Balances, assets and currencies are owned by the surrounding node. The
//! engine only needs point-in-time balance queries at already-final heights,
//! existence checks for holdings, and a way to apply or undo the effects of a
//! phased transaction once its poll is decided.

pub mod error;
pub mod view;

pub use error::LedgerError;
pub use view::LedgerView;
