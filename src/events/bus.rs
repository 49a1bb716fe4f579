//! # Event bus for broadcasting diagnostic events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from multiple sources (registry, executor
//! loop, caller handles, subscriber workers).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                 Receivers (one per subscriber):
//!   Registry ────┐                 ┌──► worker 1 ──► subscriber 1
//!   Executor ────┼──────► Bus ──────┤
//!   Handles  ────┘  (broadcast chan) └──► worker N ──► subscriber N
//!                         ▲                  │
//!                         └──── WeakBus ◄────┘  (lag / panic reports)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.
//! - **Weak publishers**: a [`WeakBus`] publishes without keeping the channel open,
//!   so receivers still see `Closed` once every [`Bus`] is gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for diagnostic events.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub(crate) fn downgrade(&self) -> WeakBus {
        WeakBus {
            tx: self.tx.downgrade(),
        }
    }
}

/// Publisher that does not keep the bus alive.
#[derive(Clone)]
pub(crate) struct WeakBus {
    tx: broadcast::WeakSender<Event>,
}

impl WeakBus {
    /// Publishes if some [`Bus`] is still alive.
    pub(crate) fn publish(&self, ev: Event) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(ev);
        }
    }
}
