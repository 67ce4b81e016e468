//! The integration hook between the block processor and the phasing engine.
//!
//! Chain events are handled synchronously: a height counts as processed only
//! once every poll finishing there has been resolved (or un-resolved) and
//! persisted. Listeners on the [`EventBus`] hear about a height only after
//! that, so nobody observes a half-resolved poll set.

use std::sync::Arc;

use vigil_phasing::{PhasingEngine, PollRequest, ResolvedPoll, VoteOutcome};
use vigil_types::{AccountId, Poll, TxHash};

use crate::event::{ChainEvent, EventBus, PhasingEvent};
use crate::NodeError;

pub struct IntegrationHook {
    engine: Arc<PhasingEngine>,
    events: EventBus,
    emit_events: bool,
    /// Height of the last fully processed block.
    height: u64,
    halted: Option<(u64, String)>,
}

impl IntegrationHook {
    /// Create a hook for a chain whose tip is at `height`.
    pub fn new(engine: Arc<PhasingEngine>, height: u64) -> Self {
        Self {
            engine,
            events: EventBus::new(),
            emit_events: true,
            height,
            halted: None,
        }
    }

    pub fn set_emit_events(&mut self, emit: bool) {
        self.emit_events = emit;
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&PhasingEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    pub fn engine(&self) -> &PhasingEngine {
        &self.engine
    }

    /// Height of the last fully processed block.
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Register the poll of a phased transaction contained in the block
    /// being applied (at `height() + 1`). A fatal error halts the hook.
    pub fn register(&mut self, request: PollRequest) -> Result<Poll, NodeError> {
        self.check_running()?;
        let height = self.height + 1;
        let result = self.engine.register(request, height).map_err(NodeError::from);
        self.halt_on_fatal(height, result)
    }

    /// Cast a vote contained in the block being applied (at `height() + 1`).
    /// A fatal error halts the hook.
    pub fn cast_vote(&mut self, poll: &TxHash, voter: &AccountId) -> Result<VoteOutcome, NodeError> {
        self.check_running()?;
        let height = self.height + 1;
        let result = self.engine.cast_vote(poll, voter, height).map_err(NodeError::from);
        self.halt_on_fatal(height, result)
    }

    pub fn on_block_applied(&mut self, height: u64) -> Result<Vec<PhasingEvent>, NodeError> {
        self.handle(ChainEvent::BlockApplied { height })
    }

    pub fn on_block_popped_off(&mut self, height: u64) -> Result<Vec<PhasingEvent>, NodeError> {
        self.handle(ChainEvent::BlockPoppedOff { height })
    }

    /// Process one chain event and return the phasing events it produced.
    ///
    /// Applies are accepted only at `height() + 1` and pop-offs only at
    /// `height()`. A fatal error halts the hook: every later event fails
    /// with [`NodeError::Halted`].
    pub fn handle(&mut self, event: ChainEvent) -> Result<Vec<PhasingEvent>, NodeError> {
        self.check_running()?;
        let expected = match event {
            ChainEvent::BlockApplied { .. } => self.height + 1,
            ChainEvent::BlockPoppedOff { .. } => self.height,
        };
        if event.height() != expected || event.height() == 0 {
            return Err(NodeError::OutOfOrder {
                expected,
                got: event.height(),
            });
        }

        let result = match event {
            ChainEvent::BlockApplied { height } => self
                .engine
                .resolve_height(height)
                .map(|resolved| (height, to_events(&resolved, PhasingEvent::resolved))),
            ChainEvent::BlockPoppedOff { height } => self
                .engine
                .pop_height(height)
                .map(|reverted| (height - 1, to_events(&reverted, PhasingEvent::reverted))),
        };

        let (height, events) = self.halt_on_fatal(event.height(), result.map_err(NodeError::from))?;
        self.height = height;

        tracing::debug!(?event, changed = events.len(), "chain event processed");
        if self.emit_events {
            for e in &events {
                self.events.emit(e);
            }
        }
        Ok(events)
    }

    fn halt_on_fatal<T>(&mut self, height: u64, result: Result<T, NodeError>) -> Result<T, NodeError> {
        if let Err(err) = &result {
            if err.is_fatal() {
                tracing::error!(height, error = %err, "halting phasing");
                self.halted = Some((height, err.to_string()));
            }
        }
        result
    }

    fn check_running(&self) -> Result<(), NodeError> {
        match &self.halted {
            Some((height, reason)) => Err(NodeError::Halted {
                height: *height,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn to_events(polls: &[ResolvedPoll], f: fn(&ResolvedPoll) -> PhasingEvent) -> Vec<PhasingEvent> {
    polls.iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_nullables::{NullLedger, NullPollStore, NullVoteStore, Transfer};
    use vigil_types::{HoldingKind, MinBalanceModel, PhasingParams, VotingModel};

    fn setup(height: u64) -> (Arc<NullLedger>, IntegrationHook) {
        let ledger = Arc::new(NullLedger::new());
        let engine = PhasingEngine::new(
            Arc::new(NullPollStore::new()),
            Arc::new(NullVoteStore::new()),
            ledger.clone(),
            PhasingParams::default(),
        );
        (ledger, IntegrationHook::new(Arc::new(engine), height))
    }

    fn request(seed: u8, finish_height: u64) -> PollRequest {
        PollRequest {
            transaction: TxHash::new([seed; 32]),
            account: AccountId::new(1),
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

    #[test]
    fn rejects_out_of_order_events() {
        let (_ledger, mut hook) = setup(10);
        assert!(matches!(
            hook.on_block_applied(12),
            Err(NodeError::OutOfOrder { expected: 11, got: 12 })
        ));
        assert!(matches!(
            hook.on_block_popped_off(9),
            Err(NodeError::OutOfOrder { expected: 10, got: 9 })
        ));
        hook.on_block_applied(11).unwrap();
        hook.on_block_popped_off(11).unwrap();
        assert_eq!(hook.height(), 10);
        assert!(!hook.is_halted());
    }

    #[test]
    fn publishes_after_resolution() {
        let (_ledger, mut hook) = setup(99);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        hook.subscribe(Box::new(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        }));

        hook.register(request(1, 101)).unwrap();
        hook.on_block_applied(100).unwrap();
        let events = hook.on_block_applied(101).unwrap();
        assert!(matches!(events[0], PhasingEvent::PollRejected { height: 101, .. }));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn silent_when_events_disabled() {
        let (_ledger, mut hook) = setup(99);
        hook.set_emit_events(false);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        hook.subscribe(Box::new(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        }));
        hook.register(request(1, 101)).unwrap();
        hook.on_block_applied(100).unwrap();
        assert_eq!(hook.on_block_applied(101).unwrap().len(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fatal_error_halts() {
        let (ledger, mut hook) = setup(99);
        let key = TxHash::new([1; 32]);
        hook.register(request(1, 102)).unwrap();
        ledger.defer(
            key,
            Transfer {
                from: AccountId::new(1),
                to: AccountId::new(2),
                kind: HoldingKind::Native,
                holding: None,
                amount: 1,
            },
        );
        ledger.fail_release_of(key);
        hook.on_block_applied(100).unwrap();
        assert!(hook.cast_vote(&key, &AccountId::new(5)).unwrap().is_accepted());
        hook.on_block_applied(101).unwrap();

        let err = hook.on_block_applied(102).unwrap_err();
        assert!(err.is_fatal());
        assert!(hook.is_halted());
        assert_eq!(hook.height(), 101);
        assert!(matches!(hook.on_block_applied(102), Err(NodeError::Halted { height: 102, .. })));
        assert!(matches!(hook.register(request(2, 120)), Err(NodeError::Halted { .. })));
    }

    #[test]
    fn registration_error_does_not_halt() {
        let (_ledger, mut hook) = setup(99);
        let err = hook.register(request(1, 100 + 100_000)).unwrap_err();
        assert!(!err.is_fatal());
        assert!(!hook.is_halted());
    }

    #[test]
    fn fatal_vote_error_halts() {
        let (ledger, mut hook) = setup(99);
        let key = TxHash::new([1; 32]);
        hook.register(PollRequest {
            min_balance: 5,
            min_balance_model: MinBalanceModel::Native,
            ..request(1, 110)
        })
        .unwrap();
        // Balances above the tip are not final yet.
        ledger.set_tip(99);

        let err = hook.cast_vote(&key, &AccountId::new(5)).unwrap_err();
        assert!(err.is_fatal());
        assert!(hook.is_halted());
        assert_eq!(hook.height(), 99);
        assert!(matches!(hook.on_block_applied(100), Err(NodeError::Halted { height: 100, .. })));
        assert!(matches!(
            hook.cast_vote(&key, &AccountId::new(6)),
            Err(NodeError::Halted { .. })
        ));
    }
}
