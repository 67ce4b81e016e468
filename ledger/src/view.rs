//! The ledger seam trait.

use crate::LedgerError;
use vigil_types::{AccountId, HoldingId, HoldingKind, TxHash};

/// What the engine consumes from the account ledger.
///
/// Balance queries are keyed by height and must be answered from immutable,
/// already-applied state so that every node computes the same weights.
pub trait LedgerView {
    /// Balance of `account` in the given holding as of the end of block `height`.
    ///
    /// `holding` is `None` for [`HoldingKind::Native`].
    fn balance_of(
        &self,
        account: &AccountId,
        kind: HoldingKind,
        holding: Option<HoldingId>,
        height: u64,
    ) -> Result<u64, LedgerError>;

    /// Whether an asset or currency with this id exists.
    fn holding_exists(&self, kind: HoldingKind, holding: HoldingId) -> Result<bool, LedgerError>;

    /// Apply the deferred effects of an approved phased transaction.
    fn apply_release(&self, transaction: &TxHash) -> Result<(), LedgerError>;

    /// Reverse a previous [`LedgerView::apply_release`].
    fn undo_release(&self, transaction: &TxHash) -> Result<(), LedgerError>;
}
