use thiserror::Error;
use vigil_types::TxHash;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("balance at height {requested} is not final (ledger is at {current})")]
    HeightNotFinal { requested: u64, current: u64 },

    #[error("no release recorded for transaction {0}")]
    UnknownRelease(TxHash),

    #[error("release of {0} was already applied")]
    AlreadyReleased(TxHash),

    #[error("release of {0} is not applied")]
    NotReleased(TxHash),

    #[error("release of {hash} failed: {reason}")]
    ReleaseFailed { hash: TxHash, reason: String },

    #[error("ledger backend error: {0}")]
    Backend(String),
}
