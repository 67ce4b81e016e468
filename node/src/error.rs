use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("phasing error: {0}")]
    Phasing(#[from] vigil_phasing::PhasingError),

    #[error("store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] vigil_store_lmdb::LmdbError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A chain event arrived for a height other than the next one expected.
    #[error("out of order chain event: expected height {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    /// An earlier fatal error stopped block processing.
    #[error("phasing halted at height {height}: {reason}")]
    Halted { height: u64, reason: String },
}

impl NodeError {
    /// Whether the node must stop processing blocks.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Phasing(e) => e.is_fatal(),
            Self::OutOfOrder { .. } | Self::Config(_) => false,
            _ => true,
        }
    }
}
