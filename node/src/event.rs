//! Chain events consumed by the integration hook, and the phasing events it
//! publishes once a height is fully processed.

use vigil_phasing::ResolvedPoll;
use vigil_types::{AccountId, PollStatus, TxHash};

/// Delivered by the block processor, exactly once per height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    /// The block at `height` was applied; the chain is now at `height`.
    BlockApplied { height: u64 },
    /// The block at `height` was popped off; the chain is now at `height - 1`.
    BlockPoppedOff { height: u64 },
}

impl ChainEvent {
    pub fn height(&self) -> u64 {
        match *self {
            Self::BlockApplied { height } | Self::BlockPoppedOff { height } => height,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhasingEvent {
    /// A poll was approved and its transaction released.
    PollApproved {
        poll: TxHash,
        account: AccountId,
        tally: u64,
        height: u64,
    },
    PollRejected {
        poll: TxHash,
        account: AccountId,
        tally: u64,
        height: u64,
    },
    /// A resolution was undone because its block was popped off.
    ResolutionReverted {
        poll: TxHash,
        account: AccountId,
        previous: PollStatus,
        height: u64,
    },
}

impl PhasingEvent {
    pub fn resolved(poll: &ResolvedPoll) -> Self {
        match poll.status {
            PollStatus::Approved => Self::PollApproved {
                poll: poll.key,
                account: poll.account,
                tally: poll.tally,
                height: poll.height,
            },
            _ => Self::PollRejected {
                poll: poll.key,
                account: poll.account,
                tally: poll.tally,
                height: poll.height,
            },
        }
    }

    pub fn reverted(poll: &ResolvedPoll) -> Self {
        Self::ResolutionReverted {
            poll: poll.key,
            account: poll.account,
            previous: poll.status,
            height: poll.height,
        }
    }

    pub fn poll(&self) -> &TxHash {
        match self {
            Self::PollApproved { poll, .. }
            | Self::PollRejected { poll, .. }
            | Self::ResolutionReverted { poll, .. } => poll,
        }
    }
}

/// Synchronous fan-out event bus for phasing events.
///
/// Listeners are invoked inline on the emitting thread; keep handlers fast to
/// avoid stalling block processing.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&PhasingEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&PhasingEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &PhasingEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    fn resolved(status: PollStatus) -> ResolvedPoll {
        ResolvedPoll {
            key: TxHash::new([3u8; 32]),
            account: AccountId::new(1),
            status,
            tally: 4,
            height: 110,
        }
    }

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();

        let c1 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        }));

        bus.emit(&PhasingEvent::resolved(&resolved(PollStatus::Approved)));
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn emit_with_no_listeners_is_noop() {
        let bus = EventBus::default();
        assert_eq!(bus.listener_count(), 0);
        bus.emit(&PhasingEvent::resolved(&resolved(PollStatus::Rejected)));
    }

    #[test]
    fn events_mirror_resolution() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let s = Arc::clone(&seen);
        bus.subscribe(Box::new(move |event| s.lock().unwrap().push(event.clone())));

        let approved = resolved(PollStatus::Approved);
        bus.emit(&PhasingEvent::resolved(&approved));
        bus.emit(&PhasingEvent::reverted(&approved));

        let seen = seen.lock().unwrap();
        assert!(matches!(seen[0], PhasingEvent::PollApproved { tally: 4, height: 110, .. }));
        assert_eq!(
            seen[1],
            PhasingEvent::ResolutionReverted {
                poll: approved.key,
                account: approved.account,
                previous: PollStatus::Approved,
                height: 110,
            }
        );
    }

    #[test]
    fn chain_event_height() {
        assert_eq!(ChainEvent::BlockApplied { height: 7 }.height(), 7);
        assert_eq!(ChainEvent::BlockPoppedOff { height: 9 }.height(), 9);
    }
}
