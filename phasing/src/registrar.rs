//! Poll registration: creating a poll when a phased transaction is included
//! in a block, and removing it again when that block is popped off.

use std::collections::HashSet;
use std::sync::Arc;

use vigil_ledger::LedgerView;
use vigil_store::{PollStore, StoreError};
use vigil_types::{
    AccountId, HoldingId, HoldingKind, MinBalanceModel, PhasingParams, Poll, PollStatus, TxHash,
    VotingModel,
};

use crate::error::{ConsistencyError, PhasingError, RegistrationError};

/// Poll parameters carried by a phased transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollRequest {
    pub transaction: TxHash,
    pub account: AccountId,
    pub finish_height: u64,
    pub voting_model: VotingModel,
    pub holding_id: Option<HoldingId>,
    pub min_balance: u64,
    pub min_balance_model: MinBalanceModel,
    pub quorum: Option<u64>,
    pub whitelist: Vec<AccountId>,
    pub linked_hashes: Vec<TxHash>,
}

pub struct PollRegistrar {
    polls: Arc<dyn PollStore + Send + Sync>,
    ledger: Arc<dyn LedgerView + Send + Sync>,
    params: PhasingParams,
}

impl PollRegistrar {
    pub fn new(
        polls: Arc<dyn PollStore + Send + Sync>,
        ledger: Arc<dyn LedgerView + Send + Sync>,
        params: PhasingParams,
    ) -> Self {
        Self {
            polls,
            ledger,
            params,
        }
    }

    pub fn params(&self) -> &PhasingParams {
        &self.params
    }

    /// Validate `request` and store a pending poll for it.
    ///
    /// `current_height` is the height of the block containing the phased
    /// transaction. On error nothing is stored.
    pub fn register(&self, request: PollRequest, current_height: u64) -> Result<Poll, PhasingError> {
        if let Err(e) = self.validate(&request, current_height) {
            tracing::debug!(
                poll = %request.transaction,
                height = current_height,
                error = %e,
                "poll registration rejected"
            );
            return Err(e);
        }

        let mut whitelist = request.whitelist;
        whitelist.sort_unstable();
        let poll = Poll {
            key: request.transaction,
            account: request.account,
            created_height: current_height,
            finish_height: request.finish_height,
            voting_model: request.voting_model,
            holding_id: request.holding_id,
            min_balance: request.min_balance,
            min_balance_model: request.min_balance_model,
            quorum: request.quorum,
            whitelist,
            linked_hashes: request.linked_hashes,
            status: PollStatus::Pending,
            tally: 0,
        };

        match self.polls.insert_poll(&poll) {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(RegistrationError::Duplicate(poll.key).into());
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(
            poll = %poll.key,
            account = %poll.account,
            model = poll.voting_model.name(),
            finish_height = poll.finish_height,
            "registered poll"
        );
        Ok(poll)
    }

    /// Run every registration check without storing anything.
    ///
    /// Checks run in a fixed order and the first failure is returned.
    pub fn validate(&self, request: &PollRequest, current_height: u64) -> Result<(), PhasingError> {
        self.check_finish_height(request, current_height)?;
        check_model_consistency(request)?;
        self.check_holdings_exist(request)?;
        self.check_whitelist(request)?;
        self.check_linked(request)?;
        if self.polls.get_poll(&request.transaction)?.is_some() {
            return Err(RegistrationError::Duplicate(request.transaction).into());
        }
        Ok(())
    }

    /// Remove the polls registered by the block at `height`, which is being
    /// popped off. Such polls finish strictly later, so they must be pending.
    pub fn rollback_registrations_at(&self, height: u64) -> Result<usize, PhasingError> {
        let keys = self.check_rollback_at(height)?;
        for key in &keys {
            self.polls.delete_poll(key)?;
        }
        if !keys.is_empty() {
            tracing::debug!(height, count = keys.len(), "rolled back poll registrations");
        }
        Ok(keys.len())
    }

    /// Keys of the polls registered at `height`, failing if any of them is
    /// already resolved. Reads only.
    pub fn check_rollback_at(&self, height: u64) -> Result<Vec<TxHash>, PhasingError> {
        let keys = self.polls.polls_created_at(height)?;
        for key in &keys {
            if let Some(poll) = self.polls.get_poll(key)? {
                if !poll.is_pending() {
                    let err = ConsistencyError::RollbackOfResolved { poll: *key, height };
                    tracing::error!(error = %err, "cannot roll back registration");
                    return Err(err.into());
                }
            }
        }
        Ok(keys)
    }

    fn check_finish_height(&self, request: &PollRequest, current_height: u64) -> Result<(), RegistrationError> {
        if request.finish_height <= current_height {
            return Err(RegistrationError::FinishHeightNotAhead {
                finish_height: request.finish_height,
                current_height,
            });
        }
        let max_height = current_height.saturating_add(self.params.max_finish_horizon);
        if request.finish_height > max_height {
            return Err(RegistrationError::FinishHeightTooFar {
                finish_height: request.finish_height,
                max_height,
            });
        }
        Ok(())
    }

    fn check_holdings_exist(&self, request: &PollRequest) -> Result<(), PhasingError> {
        let mut referenced: Vec<(HoldingKind, HoldingId)> = Vec::with_capacity(2);
        if let (Some(kind), Some(holding)) = (request.voting_model.holding_kind(), request.holding_id) {
            referenced.push((kind, holding));
        }
        if let Some((kind, Some(holding))) = request.min_balance_model.holding() {
            referenced.push((kind, holding));
        }
        for (kind, holding) in referenced {
            if !self.ledger.holding_exists(kind, holding)? {
                return Err(RegistrationError::UnknownHolding { kind, holding }.into());
            }
        }
        Ok(())
    }

    fn check_whitelist(&self, request: &PollRequest) -> Result<(), RegistrationError> {
        let size = request.whitelist.len();
        if size > self.params.max_whitelist_size {
            return Err(RegistrationError::WhitelistTooLarge {
                size,
                max: self.params.max_whitelist_size,
            });
        }
        let unique: HashSet<&AccountId> = request.whitelist.iter().collect();
        if unique.len() != size {
            return Err(RegistrationError::DuplicateWhitelistEntry);
        }
        Ok(())
    }

    fn check_linked(&self, request: &PollRequest) -> Result<(), PhasingError> {
        if request.voting_model != VotingModel::TransactionApproval {
            return Ok(());
        }
        let count = request.linked_hashes.len();
        if count == 0 {
            return Err(RegistrationError::MissingLinkedHashes.into());
        }
        if count > self.params.max_linked_hashes {
            return Err(RegistrationError::TooManyLinkedHashes {
                count,
                max: self.params.max_linked_hashes,
            }
            .into());
        }
        let unique: HashSet<&TxHash> = request.linked_hashes.iter().collect();
        if unique.len() != count {
            return Err(RegistrationError::DuplicateLinkedHash.into());
        }
        for linked in &request.linked_hashes {
            if self.polls.get_poll(linked)?.is_none() {
                return Err(RegistrationError::LinkedNotPhased(*linked).into());
            }
        }
        Ok(())
    }
}

/// Model-dependent shape rules: holding, quorum, floor, whitelist and links.
fn check_model_consistency(request: &PollRequest) -> Result<(), RegistrationError> {
    let model = request.voting_model;

    match (model.is_weighted(), request.holding_id) {
        (true, None) => return Err(RegistrationError::MissingHolding(model)),
        (false, Some(_)) => return Err(RegistrationError::UnexpectedHolding(model)),
        _ => {}
    }

    match (model, request.quorum) {
        (VotingModel::TransactionApproval, Some(_)) => return Err(RegistrationError::UnexpectedQuorum),
        (VotingModel::TransactionApproval, None) => {}
        (_, None) | (_, Some(0)) => return Err(RegistrationError::MissingQuorum(model)),
        _ => {}
    }

    let floor_ok = match model {
        VotingModel::None | VotingModel::TransactionApproval => {
            request.min_balance_model == MinBalanceModel::None && request.min_balance == 0
        }
        VotingModel::Account => true,
        VotingModel::AssetWeighted | VotingModel::CurrencyWeighted => {
            request.min_balance_model != MinBalanceModel::None || request.min_balance == 0
        }
    };
    if !floor_ok {
        return Err(RegistrationError::InvalidMinBalance(model));
    }

    if model == VotingModel::None && request.whitelist.is_empty() {
        return Err(RegistrationError::MissingWhitelist(model));
    }

    if model != VotingModel::TransactionApproval && !request.linked_hashes.is_empty() {
        return Err(RegistrationError::UnexpectedLinkedHashes);
    }
    Ok(())
}
