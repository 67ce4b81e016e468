//! End-to-end tests driving the phasing engine through the integration hook:
//! registration → votes → resolution at the finish height → pop-off → re-apply.
//!
//! Every scenario runs against both the in-memory stores and LMDB.

use std::sync::{Arc, Mutex};

use vigil_ledger::LedgerView;
use vigil_node::{IntegrationHook, PhasingConfig, PhasingEvent, VigilNode};
use vigil_nullables::{NullLedger, NullPollStore, NullVoteStore, Transfer};
use vigil_phasing::{PhasingEngine, PollRequest, RejectReason, VoteOutcome};
use vigil_types::{
    AccountId, HoldingKind, MinBalanceModel, PhasingParams, PollStatus, TxHash, VotingModel,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SENDER: AccountId = AccountId::new(1);
const RECEIVER: AccountId = AccountId::new(2);
const VOTER: AccountId = AccountId::new(10);

fn tx(seed: u8) -> TxHash {
    TxHash::new([seed; 32])
}

/// In-memory hook at `height`, sharing `ledger`.
fn nullable_hook(ledger: Arc<NullLedger>, height: u64) -> IntegrationHook {
    let engine = PhasingEngine::new(
        Arc::new(NullPollStore::new()),
        Arc::new(NullVoteStore::new()),
        ledger,
        PhasingParams::default(),
    );
    IntegrationHook::new(Arc::new(engine), height)
}

fn lmdb_node(dir: &tempfile::TempDir, ledger: Arc<NullLedger>, height: u64) -> VigilNode {
    let config = PhasingConfig {
        data_dir: dir.path().join("phasing"),
        lmdb_map_size: 64 * 1024 * 1024,
        ..PhasingConfig::default()
    };
    VigilNode::open(config, ledger, height).expect("open node")
}

fn ledger_with_transfer(transaction: TxHash, amount: u64) -> Arc<NullLedger> {
    let ledger = Arc::new(NullLedger::new());
    ledger.set_balance(SENDER, HoldingKind::Native, None, 0, 100);
    ledger.defer(
        transaction,
        Transfer {
            from: SENDER,
            to: RECEIVER,
            kind: HoldingKind::Native,
            holding: None,
            amount,
        },
    );
    ledger
}

fn account_poll(seed: u8, finish_height: u64) -> PollRequest {
    PollRequest {
        transaction: tx(seed),
        account: SENDER,
        finish_height,
        voting_model: VotingModel::Account,
        holding_id: None,
        min_balance: 0,
        min_balance_model: MinBalanceModel::None,
        quorum: Some(1),
        whitelist: Vec::new(),
        linked_hashes: Vec::new(),
    }
}

fn native(ledger: &NullLedger, account: AccountId, height: u64) -> u64 {
    ledger
        .balance_of(&account, HoldingKind::Native, None, height)
        .expect("balance")
}

/// Apply the block at `height()+1`, running `body` as its contents first.
fn apply_block(
    hook: &mut IntegrationHook,
    ledger: &NullLedger,
    body: impl FnOnce(&mut IntegrationHook),
) -> Vec<PhasingEvent> {
    let height = hook.height() + 1;
    ledger.set_tip(height);
    body(&mut *hook);
    hook.on_block_applied(height).expect("apply block")
}

fn pop_block(hook: &mut IntegrationHook, ledger: &NullLedger) -> Vec<PhasingEvent> {
    let height = hook.height();
    let events = hook.on_block_popped_off(height).expect("pop block");
    ledger.set_tip(height - 1);
    events
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Register at 100 (ACCOUNT, quorum 1, finish 110), vote at 105, resolve at
/// 110, pop 110, then re-apply 110.
fn approve_pop_reapply(hook: &mut IntegrationHook, ledger: &NullLedger) {
    let t = tx(1);
    assert_eq!(hook.height(), 99);

    apply_block(hook, ledger, |hook| {
        hook.register(account_poll(1, 110)).expect("register");
    });
    while hook.height() < 104 {
        apply_block(hook, ledger, |_| {});
    }
    apply_block(hook, ledger, |hook| {
        let outcome = hook.cast_vote(&t, &VOTER).expect("vote");
        assert_eq!(outcome, VoteOutcome::Accepted { weight: 1 });
    });
    while hook.height() < 109 {
        apply_block(hook, ledger, |_| {});
    }
    assert_eq!(native(ledger, RECEIVER, 109), 0);

    let events = apply_block(hook, ledger, |_| {});
    assert_eq!(
        events,
        vec![PhasingEvent::PollApproved {
            poll: t,
            account: SENDER,
            tally: 1,
            height: 110,
        }]
    );
    let approved = hook.engine().get_poll(&t).unwrap().expect("poll");
    let votes = hook.engine().get_votes(&t).unwrap();
    assert_eq!(approved.status, PollStatus::Approved);
    assert_eq!(native(ledger, RECEIVER, 110), 30);
    assert_eq!(native(ledger, SENDER, 110), 70);

    let reverted = pop_block(hook, ledger);
    assert_eq!(
        reverted,
        vec![PhasingEvent::ResolutionReverted {
            poll: t,
            account: SENDER,
            previous: PollStatus::Approved,
            height: 110,
        }]
    );
    assert_eq!(hook.height(), 109);
    let pending = hook.engine().get_poll(&t).unwrap().expect("poll");
    assert_eq!(pending.status, PollStatus::Pending);
    assert_eq!(pending.tally, 0);
    assert!(!ledger.is_released(&t));
    assert_eq!(native(ledger, RECEIVER, 109), 0);
    assert_eq!(hook.engine().list_pending_by_finish_height(110).unwrap().len(), 1);

    let again = apply_block(hook, ledger, |_| {});
    assert_eq!(again, events);
    assert_eq!(hook.engine().get_poll(&t).unwrap(), Some(approved));
    assert_eq!(hook.engine().get_votes(&t).unwrap(), votes);
    assert_eq!(native(ledger, RECEIVER, 110), 30);
}

/// A transaction approval poll linked to a rejected poll is rejected, and
/// popping blocks back past registration removes both polls and the vote.
fn linked_rejection_and_deep_pop(hook: &mut IntegrationHook, ledger: &NullLedger) {
    apply_block(hook, ledger, |hook| {
        hook.register(account_poll(1, 105)).expect("register base");
    });
    apply_block(hook, ledger, |hook| {
        let mut linked = account_poll(2, 108);
        linked.voting_model = VotingModel::TransactionApproval;
        linked.quorum = None;
        linked.linked_hashes = vec![tx(1)];
        hook.register(linked).expect("register linked");
        let outcome = hook.cast_vote(&tx(2), &VOTER).expect("vote");
        assert!(outcome.is_accepted());
    });
    while hook.height() < 108 {
        apply_block(hook, ledger, |_| {});
    }
    assert_eq!(hook.engine().get_poll(&tx(1)).unwrap().unwrap().status, PollStatus::Rejected);
    assert_eq!(hook.engine().get_poll(&tx(2)).unwrap().unwrap().status, PollStatus::Rejected);

    let outcome = hook.cast_vote(&tx(2), &AccountId::new(11)).unwrap();
    assert_eq!(outcome, VoteOutcome::Rejected(RejectReason::AlreadyResolved));

    while hook.height() > 100 {
        pop_block(hook, ledger);
    }
    assert!(hook.engine().get_poll(&tx(2)).unwrap().is_none());
    assert!(hook.engine().get_votes(&tx(2)).unwrap().is_empty());
    assert_eq!(hook.engine().get_poll(&tx(1)).unwrap().unwrap().status, PollStatus::Pending);

    pop_block(hook, ledger);
    assert_eq!(hook.engine().poll_count().unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn approve_pop_reapply_nullable() {
    let ledger = ledger_with_transfer(tx(1), 30);
    let mut hook = nullable_hook(ledger.clone(), 99);
    approve_pop_reapply(&mut hook, &ledger);
}

#[test]
fn approve_pop_reapply_lmdb() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ledger = ledger_with_transfer(tx(1), 30);
    let mut node = lmdb_node(&dir, ledger.clone(), 99);
    approve_pop_reapply(node.hook_mut(), &ledger);
}

#[test]
fn linked_rejection_nullable() {
    let ledger = Arc::new(NullLedger::new());
    let mut hook = nullable_hook(ledger.clone(), 99);
    linked_rejection_and_deep_pop(&mut hook, &ledger);
}

#[test]
fn linked_rejection_lmdb() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ledger = Arc::new(NullLedger::new());
    let mut node = lmdb_node(&dir, ledger.clone(), 99);
    linked_rejection_and_deep_pop(node.hook_mut(), &ledger);
}

#[test]
fn resolutions_survive_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ledger = ledger_with_transfer(tx(1), 30);
    {
        let mut node = lmdb_node(&dir, ledger.clone(), 99);
        let hook = node.hook_mut();
        apply_block(hook, &ledger, |hook| {
            hook.register(account_poll(1, 102)).expect("register");
        });
        apply_block(hook, &ledger, |hook| {
            hook.cast_vote(&tx(1), &VOTER).expect("vote");
        });
        apply_block(hook, &ledger, |_| {});
    }

    let node = lmdb_node(&dir, ledger, 102);
    let poll = node.engine().get_poll(&tx(1)).unwrap().expect("poll persisted");
    assert_eq!(poll.status, PollStatus::Approved);
    assert_eq!(poll.tally, 1);
    assert_eq!(node.engine().get_votes(&tx(1)).unwrap().len(), 1);
    assert!(node.engine().list_pending_by_account(&SENDER).unwrap().is_empty());
}

#[test]
fn subscribers_see_each_height_once() {
    let ledger = ledger_with_transfer(tx(1), 30);
    let mut hook = nullable_hook(ledger.clone(), 99);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    hook.subscribe(Box::new(move |event| s.lock().unwrap().push(event.clone())));

    approve_pop_reapply(&mut hook, &ledger);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(matches!(seen[0], PhasingEvent::PollApproved { .. }));
    assert!(matches!(seen[1], PhasingEvent::ResolutionReverted { .. }));
    assert_eq!(seen[2], seen[0]);
}
