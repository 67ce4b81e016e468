use std::sync::Arc;

use proptest::prelude::*;

use vigil_nullables::{NullLedger, NullPollStore, NullVoteStore, Transfer};
use vigil_phasing::{PhasingEngine, PollRequest, VoteOutcome};
use vigil_types::{
    AccountId, HoldingId, HoldingKind, MinBalanceModel, PhasingParams, PollStatus, TxHash,
    VotingModel,
};

const ASSET: HoldingId = HoldingId::new(1);

struct Harness {
    polls: Arc<NullPollStore>,
    ledger: Arc<NullLedger>,
    engine: PhasingEngine,
}

fn harness() -> Harness {
    let polls = Arc::new(NullPollStore::new());
    let ledger = Arc::new(NullLedger::new());
    ledger.add_holding(HoldingKind::Asset, ASSET);
    let engine = PhasingEngine::new(
        polls.clone(),
        Arc::new(NullVoteStore::new()),
        ledger.clone(),
        PhasingParams::default(),
    );
    Harness {
        polls,
        ledger,
        engine,
    }
}

impl Harness {
    /// Registers the poll with its gated transaction deferred on the ledger.
    fn register(&self, request: PollRequest) {
        self.ledger.defer(
            request.transaction,
            Transfer {
                from: AccountId::new(1),
                to: AccountId::new(2),
                kind: HoldingKind::Native,
                holding: None,
                amount: 1,
            },
        );
        self.engine.register(request, 100).unwrap();
    }
}

fn request(seed: u8, model: VotingModel, quorum: u64) -> PollRequest {
    PollRequest {
        transaction: TxHash::new([seed; 32]),
        account: AccountId::new(1),
        finish_height: 110,
        voting_model: model,
        holding_id: model.is_weighted().then_some(ASSET),
        min_balance: 0,
        min_balance_model: MinBalanceModel::None,
        quorum: Some(quorum),
        whitelist: Vec::new(),
        linked_hashes: Vec::new(),
    }
}

proptest! {
    /// A count-model poll with N accepted votes and quorum Q is approved iff N >= Q.
    #[test]
    fn count_quorum_decides(n in 0u64..12, q in 1u64..12) {
        let h = harness();
        let key = TxHash::new([1; 32]);
        h.register(request(1, VotingModel::Account, q));
        for voter in 0..n {
            let outcome = h.engine.cast_vote(&key, &AccountId::new(100 + voter), 105).unwrap();
            prop_assert_eq!(outcome, VoteOutcome::Accepted { weight: 1 });
        }

        let resolved = h.engine.resolve_height(110).unwrap();
        let expected = if n >= q { PollStatus::Approved } else { PollStatus::Rejected };
        prop_assert_eq!(resolved[0].status, expected);
        prop_assert_eq!(resolved[0].tally, n);
    }

    /// Weighted outcomes use balances captured at cast time, whatever
    /// happens to the balances afterwards.
    #[test]
    fn weights_are_frozen_at_cast(
        balances in prop::collection::vec(1u64..1_000, 1..6),
        later in prop::collection::vec(0u64..1_000, 6),
        quorum in 1u64..3_000,
    ) {
        let h = harness();
        let key = TxHash::new([1; 32]);
        h.register(request(1, VotingModel::AssetWeighted, quorum));
        for (i, balance) in balances.iter().enumerate() {
            let voter = AccountId::new(i as u64);
            h.ledger.set_balance(voter, HoldingKind::Asset, Some(ASSET), 0, *balance);
            h.engine.cast_vote(&key, &voter, 104).unwrap();
            h.ledger.set_balance(voter, HoldingKind::Asset, Some(ASSET), 106, later[i]);
        }

        let total: u64 = balances.iter().sum();
        let resolved = h.engine.resolve_height(110).unwrap();
        prop_assert_eq!(resolved[0].tally, total);
        prop_assert_eq!(resolved[0].status == PollStatus::Approved, total >= quorum);
    }

    /// Resolving, undoing and resolving the same height again reproduces
    /// the same statuses, tallies and releases.
    #[test]
    fn apply_undo_reapply_is_identical(
        votes in prop::collection::vec(prop::collection::vec(0u64..8, 0..6), 1..6),
        quorum in 1u64..4,
    ) {
        let h = harness();
        for (i, voters) in votes.iter().enumerate() {
            let seed = i as u8 + 1;
            let key = TxHash::new([seed; 32]);
            h.register(request(seed, VotingModel::Account, quorum));
            for voter in voters {
                h.engine.cast_vote(&key, &AccountId::new(*voter), 105).unwrap();
            }
        }

        let first = h.engine.resolve_height(110).unwrap();
        let polls_after = h.polls.all_polls();
        let released_after = h.ledger.released();

        let reverted = h.engine.resolver().undo_height(110).unwrap();
        prop_assert_eq!(reverted.len(), first.len());
        prop_assert!(h.polls.all_polls().iter().all(|p| p.status == PollStatus::Pending && p.tally == 0));
        prop_assert!(h.ledger.released().is_empty());

        let second = h.engine.resolve_height(110).unwrap();
        prop_assert_eq!(second, first);
        prop_assert_eq!(h.polls.all_polls(), polls_after);
        prop_assert_eq!(h.ledger.released(), released_after);
    }
}
