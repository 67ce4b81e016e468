//! Polls gating phased transactions, and the votes cast on them.

use crate::{AccountId, HoldingId, HoldingKind, TxHash};
use serde::{Deserialize, Serialize};

/// How a poll's voters are weighted and how its outcome is decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VotingModel {
    /// Every (whitelisted) voter counts once; approval is a yes-count.
    None,
    /// One vote per account whose native balance meets the floor.
    Account,
    /// Votes weighted by the voter's balance of an asset.
    AssetWeighted,
    /// Votes weighted by the voter's balance of a currency.
    CurrencyWeighted,
    /// Approved iff every linked phased transaction is approved.
    TransactionApproval,
}

impl VotingModel {
    /// Whether votes carry a balance-derived weight.
    pub fn is_weighted(&self) -> bool {
        matches!(self, Self::AssetWeighted | Self::CurrencyWeighted)
    }

    /// The holding kind a weighted model measures, if any.
    pub fn holding_kind(&self) -> Option<HoldingKind> {
        match self {
            Self::AssetWeighted => Some(HoldingKind::Asset),
            Self::CurrencyWeighted => Some(HoldingKind::Currency),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Account => "account",
            Self::AssetWeighted => "asset_weighted",
            Self::CurrencyWeighted => "currency_weighted",
            Self::TransactionApproval => "transaction_approval",
        }
    }
}

/// Which balance a per-voter eligibility floor is measured in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinBalanceModel {
    None,
    Native,
    Asset(HoldingId),
    Currency(HoldingId),
}

impl MinBalanceModel {
    /// The `(kind, holding)` pair to query, or `None` when there is no floor.
    pub fn holding(&self) -> Option<(HoldingKind, Option<HoldingId>)> {
        match *self {
            Self::None => None,
            Self::Native => Some((HoldingKind::Native, None)),
            Self::Asset(id) => Some((HoldingKind::Asset, Some(id))),
            Self::Currency(id) => Some((HoldingKind::Currency, Some(id))),
        }
    }
}

/// Resolution state of a poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollStatus {
    Pending,
    Approved,
    Rejected,
}

impl PollStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A poll gating one phased transaction.
///
/// Only `status` and `tally` ever change after creation, and only through a
/// resolution or its undo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// Full hash of the gated transaction.
    pub key: TxHash,
    /// Account that submitted the gated transaction.
    pub account: AccountId,
    /// Height of the block that registered the poll.
    pub created_height: u64,
    /// Height at which the poll resolves.
    pub finish_height: u64,
    pub voting_model: VotingModel,
    /// Asset or currency used for weighting; only for weighted models.
    pub holding_id: Option<HoldingId>,
    pub min_balance: u64,
    pub min_balance_model: MinBalanceModel,
    /// Minimum YES weight (vote count for unweighted models).
    pub quorum: Option<u64>,
    /// Accounts allowed to vote, sorted ascending. Empty means anyone.
    pub whitelist: Vec<AccountId>,
    /// Phased transactions that must also be approved (TRANSACTION_APPROVAL).
    pub linked_hashes: Vec<TxHash>,
    pub status: PollStatus,
    /// YES weight counted when the poll resolved; 0 while pending.
    pub tally: u64,
}

impl Poll {
    pub fn is_pending(&self) -> bool {
        self.status == PollStatus::Pending
    }

    pub fn has_whitelist(&self) -> bool {
        !self.whitelist.is_empty()
    }

    /// Whether `account` may vote as far as the whitelist is concerned.
    pub fn admits(&self, account: &AccountId) -> bool {
        self.whitelist.is_empty() || self.whitelist.binary_search(account).is_ok()
    }
}

/// An approval vote on a poll, with the weight captured when it was cast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub poll: TxHash,
    pub voter: AccountId,
    pub weight: u64,
    /// Height of the block that contained the vote.
    pub height: u64,
}
