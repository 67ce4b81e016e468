//! The weight model: how much a voter's approval counts.
//!
//! Pure function of the poll's voting criteria, the voter and a height. All
//! balances are read at that height, never from mutable current state, so
//! replaying a chain reproduces every captured weight.

use std::sync::Arc;

use vigil_ledger::{LedgerError, LedgerView};
use vigil_types::{AccountId, HoldingId, HoldingKind, MinBalanceModel, Poll, VotingModel};

/// The parts of a poll that decide a voter's weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoterCriteria {
    pub model: VotingModel,
    pub holding_id: Option<HoldingId>,
    pub min_balance_model: MinBalanceModel,
    pub min_balance: u64,
}

impl VoterCriteria {
    pub fn of(poll: &Poll) -> Self {
        Self {
            model: poll.voting_model,
            holding_id: poll.holding_id,
            min_balance_model: poll.min_balance_model,
            min_balance: poll.min_balance,
        }
    }
}

/// Result of a weight query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Eligible(u64),
    Ineligible(IneligibleReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IneligibleReason {
    /// The voter's balance is below the poll's floor.
    BelowMinBalance { balance: u64, required: u64 },
    /// The voter holds none of the weighting holding.
    NoHolding,
}

/// Computes voter weights against a ledger view.
pub struct WeightModel {
    ledger: Arc<dyn LedgerView + Send + Sync>,
}

impl WeightModel {
    pub fn new(ledger: Arc<dyn LedgerView + Send + Sync>) -> Self {
        Self { ledger }
    }

    /// Weight of `voter` under `criteria` as of block `height`.
    ///
    /// - NONE and TRANSACTION_APPROVAL: always 1; the whitelist is the only gate.
    /// - ACCOUNT: 1 if the floor (native by default) is met.
    /// - ASSET/CURRENCY_WEIGHTED: the voter's balance of the holding, if the
    ///   floor is met and the balance is non-zero.
    pub fn weight(
        &self,
        criteria: &VoterCriteria,
        voter: &AccountId,
        height: u64,
    ) -> Result<Eligibility, LedgerError> {
        match criteria.model {
            VotingModel::None | VotingModel::TransactionApproval => Ok(Eligibility::Eligible(1)),
            VotingModel::Account => {
                let floor = match criteria.min_balance_model {
                    MinBalanceModel::None => MinBalanceModel::Native,
                    other => other,
                };
                if let Some(reason) = self.check_floor(floor, criteria.min_balance, voter, height)? {
                    return Ok(Eligibility::Ineligible(reason));
                }
                Ok(Eligibility::Eligible(1))
            }
            VotingModel::AssetWeighted | VotingModel::CurrencyWeighted => {
                let kind = criteria.model.holding_kind().unwrap_or(HoldingKind::Native);
                if let Some(reason) = self.check_floor(
                    criteria.min_balance_model,
                    criteria.min_balance,
                    voter,
                    height,
                )? {
                    return Ok(Eligibility::Ineligible(reason));
                }
                let balance = self
                    .ledger
                    .balance_of(voter, kind, criteria.holding_id, height)?;
                if balance == 0 {
                    return Ok(Eligibility::Ineligible(IneligibleReason::NoHolding));
                }
                Ok(Eligibility::Eligible(balance))
            }
        }
    }

    /// Weight of `voter` on `poll` as of block `height`.
    pub fn weight_for(
        &self,
        poll: &Poll,
        voter: &AccountId,
        height: u64,
    ) -> Result<Eligibility, LedgerError> {
        self.weight(&VoterCriteria::of(poll), voter, height)
    }

    fn check_floor(
        &self,
        floor: MinBalanceModel,
        required: u64,
        voter: &AccountId,
        height: u64,
    ) -> Result<Option<IneligibleReason>, LedgerError> {
        let Some((kind, holding)) = floor.holding() else {
            return Ok(None);
        };
        if required == 0 {
            return Ok(None);
        }
        let balance = self.ledger.balance_of(voter, kind, holding, height)?;
        if balance < required {
            return Ok(Some(IneligibleReason::BelowMinBalance { balance, required }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_nullables::NullLedger;

    const ASSET: HoldingId = HoldingId::new(7);

    fn criteria(model: VotingModel, holding_id: Option<HoldingId>) -> VoterCriteria {
        VoterCriteria {
            model,
            holding_id,
            min_balance_model: MinBalanceModel::None,
            min_balance: 0,
        }
    }

    fn setup() -> (Arc<NullLedger>, WeightModel) {
        let ledger = Arc::new(NullLedger::new());
        let model = WeightModel::new(ledger.clone());
        (ledger, model)
    }

    #[test]
    fn none_model_is_always_one() {
        let (_ledger, model) = setup();
        let w = model
            .weight(&criteria(VotingModel::None, None), &AccountId::new(1), 10)
            .unwrap();
        assert_eq!(w, Eligibility::Eligible(1));
    }

    #[test]
    fn account_model_checks_native_floor() {
        let (ledger, model) = setup();
        let voter = AccountId::new(1);
        ledger.set_balance(voter, HoldingKind::Native, None, 0, 50);
        let mut c = criteria(VotingModel::Account, None);
        c.min_balance = 100;
        assert_eq!(
            model.weight(&c, &voter, 10).unwrap(),
            Eligibility::Ineligible(IneligibleReason::BelowMinBalance {
                balance: 50,
                required: 100
            })
        );
        ledger.set_balance(voter, HoldingKind::Native, None, 8, 150);
        assert_eq!(model.weight(&c, &voter, 10).unwrap(), Eligibility::Eligible(1));
        // Evaluated at the requested height, not at the latest state.
        assert!(matches!(model.weight(&c, &voter, 7).unwrap(), Eligibility::Ineligible(_)));
    }

    #[test]
    fn asset_weight_is_balance_at_height() {
        let (ledger, model) = setup();
        let voter = AccountId::new(2);
        ledger.set_balance(voter, HoldingKind::Asset, Some(ASSET), 5, 100);
        ledger.set_balance(voter, HoldingKind::Asset, Some(ASSET), 12, 10);
        let c = criteria(VotingModel::AssetWeighted, Some(ASSET));
        assert_eq!(model.weight(&c, &voter, 10).unwrap(), Eligibility::Eligible(100));
        assert_eq!(model.weight(&c, &voter, 12).unwrap(), Eligibility::Eligible(10));
        assert_eq!(
            model.weight(&c, &voter, 4).unwrap(),
            Eligibility::Ineligible(IneligibleReason::NoHolding)
        );
    }

    #[test]
    fn weighted_floor_may_use_another_holding() {
        let (ledger, model) = setup();
        let voter = AccountId::new(3);
        let currency = HoldingId::new(99);
        ledger.set_balance(voter, HoldingKind::Asset, Some(ASSET), 0, 500);
        ledger.set_balance(voter, HoldingKind::Currency, Some(currency), 0, 4);
        let c = VoterCriteria {
            model: VotingModel::AssetWeighted,
            holding_id: Some(ASSET),
            min_balance_model: MinBalanceModel::Currency(currency),
            min_balance: 5,
        };
        assert!(matches!(model.weight(&c, &voter, 1).unwrap(), Eligibility::Ineligible(_)));
        ledger.set_balance(voter, HoldingKind::Currency, Some(currency), 1, 5);
        assert_eq!(model.weight(&c, &voter, 1).unwrap(), Eligibility::Eligible(500));
    }
}
