use thiserror::Error;
use vigil_ledger::LedgerError;
use vigil_store::StoreError;
use vigil_types::{HoldingId, HoldingKind, TxHash, VotingModel};

#[derive(Debug, Error)]
pub enum PhasingError {
    /// The poll parameters are invalid; nothing was stored.
    #[error("invalid poll: {0}")]
    Registration(#[from] RegistrationError),

    /// Resolution found the chain state inconsistent. Block processing must halt.
    #[error("consensus consistency violation: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl PhasingError {
    /// Whether the error must abort the block being applied and halt the node.
    ///
    /// Only registration errors are recoverable: the transaction is simply
    /// not admitted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Registration(_))
    }
}

/// Validation failures when registering a poll, in checking order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("finish height {finish_height} must be above the current height {current_height}")]
    FinishHeightNotAhead { finish_height: u64, current_height: u64 },

    #[error("finish height {finish_height} is beyond the maximum {max_height}")]
    FinishHeightTooFar { finish_height: u64, max_height: u64 },

    #[error("voting model {0:?} requires a holding id")]
    MissingHolding(VotingModel),

    #[error("voting model {0:?} does not take a holding id")]
    UnexpectedHolding(VotingModel),

    #[error("voting model {0:?} requires a quorum of at least 1")]
    MissingQuorum(VotingModel),

    #[error("transaction approval polls take no quorum")]
    UnexpectedQuorum,

    #[error("minimum balance settings are not valid for voting model {0:?}")]
    InvalidMinBalance(VotingModel),

    #[error("voting model {0:?} requires a whitelist")]
    MissingWhitelist(VotingModel),

    #[error("linked transactions are only allowed for transaction approval polls")]
    UnexpectedLinkedHashes,

    #[error("{kind:?} {holding} does not exist")]
    UnknownHolding { kind: HoldingKind, holding: HoldingId },

    #[error("whitelist has {size} entries, the maximum is {max}")]
    WhitelistTooLarge { size: usize, max: usize },

    #[error("whitelist contains duplicate accounts")]
    DuplicateWhitelistEntry,

    #[error("transaction approval polls require linked transactions")]
    MissingLinkedHashes,

    #[error("{count} linked transactions given, the maximum is {max}")]
    TooManyLinkedHashes { count: usize, max: usize },

    #[error("linked transactions contain duplicates")]
    DuplicateLinkedHash,

    #[error("linked transaction {0} is not a phased transaction")]
    LinkedNotPhased(TxHash),

    #[error("a poll for transaction {0} already exists")]
    Duplicate(TxHash),
}

/// Invariant violations found while resolving or undoing a height.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("tally overflow on poll {0}")]
    TallyOverflow(TxHash),

    #[error("poll {poll} links to {linked}, which has no poll")]
    MissingLinkedPoll { poll: TxHash, linked: TxHash },

    #[error("poll {poll} finishing at {height} is already resolved")]
    DoubleResolution { poll: TxHash, height: u64 },

    #[error("linked poll {linked} finished at {finish_height} but is still pending at {height}")]
    StalePending { linked: TxHash, finish_height: u64, height: u64 },

    #[error("poll {0} has parameters no registration could have produced")]
    MalformedPoll(TxHash),

    #[error("poll {poll} registered at {height} is already resolved")]
    RollbackOfResolved { poll: TxHash, height: u64 },
}
