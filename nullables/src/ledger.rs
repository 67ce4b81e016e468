//! Nullable ledger: deterministic balance history and deferred transfers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use vigil_ledger::{LedgerError, LedgerView};
use vigil_types::{AccountId, HoldingId, HoldingKind, TxHash};

type BalanceKey = (AccountId, HoldingKind, Option<HoldingId>);

/// The deferred effect of a phased transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: AccountId,
    pub to: AccountId,
    pub kind: HoldingKind,
    pub holding: Option<HoldingId>,
    pub amount: u64,
}

/// An in-memory account ledger for testing.
///
/// Balances are recorded as a history of `height → balance` entries; a query
/// at height `h` sees the latest entry at or below `h`, plus every applied
/// release recorded at or below `h`. Releases are recorded at the current tip.
pub struct NullLedger {
    history: Mutex<HashMap<BalanceKey, BTreeMap<u64, u64>>>,
    holdings: Mutex<HashSet<(HoldingKind, HoldingId)>>,
    deferred: Mutex<HashMap<TxHash, Transfer>>,
    /// Applied releases: transaction → tip height when applied.
    released: Mutex<BTreeMap<TxHash, u64>>,
    failing: Mutex<HashSet<TxHash>>,
    failing_undo: Mutex<HashSet<TxHash>>,
    tip: Mutex<Option<u64>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
            holdings: Mutex::new(HashSet::new()),
            deferred: Mutex::new(HashMap::new()),
            released: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            failing_undo: Mutex::new(HashSet::new()),
            tip: Mutex::new(None),
        }
    }

    /// Set `account`'s balance from `height` onwards.
    pub fn set_balance(
        &self,
        account: AccountId,
        kind: HoldingKind,
        holding: Option<HoldingId>,
        height: u64,
        amount: u64,
    ) {
        self.history
            .lock()
            .unwrap()
            .entry((account, kind, holding))
            .or_default()
            .insert(height, amount);
    }

    /// Register an asset or currency.
    pub fn add_holding(&self, kind: HoldingKind, holding: HoldingId) {
        self.holdings.lock().unwrap().insert((kind, holding));
    }

    /// Register the effect to apply when `transaction` is released.
    pub fn defer(&self, transaction: TxHash, transfer: Transfer) {
        self.deferred.lock().unwrap().insert(transaction, transfer);
    }

    /// Make the next releases of `transaction` fail.
    pub fn fail_release_of(&self, transaction: TxHash) {
        self.failing.lock().unwrap().insert(transaction);
    }

    /// Make the next undos of `transaction` fail, leaving it released.
    pub fn fail_undo_of(&self, transaction: TxHash) {
        self.failing_undo.lock().unwrap().insert(transaction);
    }

    /// Let releases and undos of `transaction` succeed again.
    pub fn clear_failures(&self, transaction: &TxHash) {
        self.failing.lock().unwrap().remove(transaction);
        self.failing_undo.lock().unwrap().remove(transaction);
    }

    /// Height of the block currently being applied. Balance queries above it
    /// are rejected as not final.
    pub fn set_tip(&self, height: u64) {
        *self.tip.lock().unwrap() = Some(height);
    }

    pub fn is_released(&self, transaction: &TxHash) -> bool {
        self.released.lock().unwrap().contains_key(transaction)
    }

    /// Applied releases in hash order, with the height they were applied at.
    pub fn released(&self) -> Vec<(TxHash, u64)> {
        self.released
            .lock()
            .unwrap()
            .iter()
            .map(|(h, at)| (*h, *at))
            .collect()
    }

    fn base_balance(&self, key: &BalanceKey, height: u64) -> u64 {
        self.history
            .lock()
            .unwrap()
            .get(key)
            .and_then(|entries| entries.range(..=height).next_back().map(|(_, v)| *v))
            .unwrap_or(0)
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerView for NullLedger {
    fn balance_of(
        &self,
        account: &AccountId,
        kind: HoldingKind,
        holding: Option<HoldingId>,
        height: u64,
    ) -> Result<u64, LedgerError> {
        if let Some(tip) = *self.tip.lock().unwrap() {
            if height > tip {
                return Err(LedgerError::HeightNotFinal {
                    requested: height,
                    current: tip,
                });
            }
        }
        let mut balance = i128::from(self.base_balance(&(*account, kind, holding), height));
        let deferred = self.deferred.lock().unwrap();
        for (hash, applied_at) in self.released.lock().unwrap().iter() {
            if *applied_at > height {
                continue;
            }
            let Some(t) = deferred.get(hash) else { continue };
            if t.kind != kind || t.holding != holding {
                continue;
            }
            if t.from == *account {
                balance -= i128::from(t.amount);
            }
            if t.to == *account {
                balance += i128::from(t.amount);
            }
        }
        Ok(u64::try_from(balance.max(0)).unwrap_or(u64::MAX))
    }

    fn holding_exists(&self, kind: HoldingKind, holding: HoldingId) -> Result<bool, LedgerError> {
        Ok(self.holdings.lock().unwrap().contains(&(kind, holding)))
    }

    fn apply_release(&self, transaction: &TxHash) -> Result<(), LedgerError> {
        if self.failing.lock().unwrap().contains(transaction) {
            return Err(LedgerError::ReleaseFailed {
                hash: *transaction,
                reason: "injected failure".into(),
            });
        }
        if !self.deferred.lock().unwrap().contains_key(transaction) {
            return Err(LedgerError::UnknownRelease(*transaction));
        }
        let at = self.tip.lock().unwrap().unwrap_or(0);
        let mut released = self.released.lock().unwrap();
        if released.contains_key(transaction) {
            return Err(LedgerError::AlreadyReleased(*transaction));
        }
        released.insert(*transaction, at);
        Ok(())
    }

    fn undo_release(&self, transaction: &TxHash) -> Result<(), LedgerError> {
        if self.failing_undo.lock().unwrap().contains(transaction) {
            return Err(LedgerError::Backend(format!(
                "injected undo failure for {transaction}"
            )));
        }
        match self.released.lock().unwrap().remove(transaction) {
            Some(_) => Ok(()),
            None => Err(LedgerError::NotReleased(*transaction)),
        }
    }
}
