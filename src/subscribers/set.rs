//! # Per-subscriber bus receivers.
//!
//! [`SubscriberSet::attach`] gives every subscriber its own receiver on the
//! executor's [`Bus`] and one worker task that feeds it. There is no shared
//! forwarding queue: a slow subscriber only lags its own receiver.
//!
//! ```text
//!            ┌──► rx 1 ──► worker 1 ──► subscriber1.on_event()
//! Bus ───────┤                 ├──► Lagged(n) → SubscriberLagged
//!            │                 └──► panic     → SubscriberPanicked
//!            └──► rx N ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - A worker stops after handing over `ExecutorStopped`, or when the bus closes.
//! - Lag and panic reports name the subscriber and are not delivered back to it.
//! - `AssertUnwindSafe` is used, so a subscriber that panics while holding a
//!   lock can leave its own state inconsistent.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind, WeakBus};
use crate::subscribers::Subscribe;

/// Workers delivering one executor's events to its subscribers.
pub struct SubscriberSet {
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Subscribes every `sub` to `bus` and spawns its worker.
    ///
    /// Receivers are created before this returns, so nothing published
    /// afterwards is missed. Must be called from within a tokio runtime.
    #[must_use]
    pub fn attach(subs: Vec<Arc<dyn Subscribe>>, bus: &Bus) -> Self {
        let workers = subs
            .into_iter()
            .map(|sub| {
                let rx = bus.subscribe();
                tokio::spawn(deliver(sub, rx, bus.downgrade()))
            })
            .collect();
        Self { workers }
    }

    /// Number of attached subscribers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits until every worker has stopped.
    pub async fn join(self) {
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn deliver(sub: Arc<dyn Subscribe>, mut rx: Receiver<Event>, bus: WeakBus) {
    let name = sub.name();
    loop {
        let ev = match rx.recv().await {
            Ok(ev) => ev,
            Err(RecvError::Lagged(missed)) => {
                bus.publish(
                    Event::new(EventKind::SubscriberLagged)
                        .with_subscriber(name)
                        .with_count(usize::try_from(missed).unwrap_or(usize::MAX)),
                );
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if !about_itself(&ev, name) && sub.interested(ev.kind) {
            let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
                .catch_unwind()
                .await;
            if let Err(payload) = handled {
                bus.publish(
                    Event::new(EventKind::SubscriberPanicked)
                        .with_subscriber(name)
                        .with_reason(panic_message(payload.as_ref())),
                );
            }
        }
        if ev.is_terminal() {
            break;
        }
    }
}

fn about_itself(ev: &Event, name: &str) -> bool {
    matches!(
        ev.kind,
        EventKind::SubscriberLagged | EventKind::SubscriberPanicked
    ) && ev.subscriber == Some(name)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Collect {
        only: Option<EventKind>,
        seen: Mutex<Vec<EventKind>>,
    }

    impl Collect {
        fn kinds(&self) -> Vec<EventKind> {
            self.seen.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.seen.lock().expect("lock").push(ev.kind);
        }

        fn interested(&self, kind: EventKind) -> bool {
            self.only.is_none_or(|only| only == kind)
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    fn drained(rx: &mut Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated_and_reported() {
        let bus = Bus::new(16);
        let mut seen = bus.subscribe();
        let collect = Arc::new(Collect::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone(), Arc::new(Panicky)];
        let set = SubscriberSet::attach(subs, &bus);
        assert_eq!(set.len(), 2);

        bus.publish(Event::new(EventKind::ExecutorStarted));
        bus.publish(
            Event::new(EventKind::SubscriberPanicked)
                .with_subscriber("panicky")
                .with_reason("earlier"),
        );
        bus.publish(Event::new(EventKind::ExecutorStopped));
        set.join().await;

        assert_eq!(
            collect.kinds(),
            vec![
                EventKind::ExecutorStarted,
                EventKind::SubscriberPanicked,
                EventKind::ExecutorStopped
            ]
        );
        let booms: Vec<_> = drained(&mut seen)
            .into_iter()
            .filter(|ev| ev.reason.as_deref() == Some("boom"))
            .collect();
        // the report about itself is skipped
        assert_eq!(booms.len(), 2);
        assert!(booms.iter().all(|ev| ev.kind == EventKind::SubscriberPanicked));
        assert!(booms.iter().all(|ev| ev.subscriber == Some("panicky")));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_reports_missed_events() {
        let bus = Bus::new(2);
        let collect = Arc::new(Collect::default());
        let set = SubscriberSet::attach(vec![collect.clone() as Arc<dyn Subscribe>], &bus);

        // current-thread runtime: the worker has not polled yet
        for _ in 0..3 {
            bus.publish(Event::new(EventKind::PostFailed));
        }
        bus.publish(Event::new(EventKind::ExecutorStopped));
        let mut seen = bus.subscribe();
        set.join().await;

        assert_eq!(
            collect.kinds(),
            vec![EventKind::PostFailed, EventKind::ExecutorStopped]
        );
        let lagged = drained(&mut seen)
            .into_iter()
            .find(|ev| ev.kind == EventKind::SubscriberLagged)
            .expect("lag reported");
        assert_eq!(lagged.count, Some(2));
        assert_eq!(lagged.subscriber, Some("Collect"));
    }

    #[tokio::test]
    async fn test_filtered_subscriber_still_stops_on_executor_stopped() {
        let bus = Bus::new(8);
        let collect = Arc::new(Collect {
            only: Some(EventKind::PostFailed),
            ..Collect::default()
        });
        let set = SubscriberSet::attach(vec![collect.clone() as Arc<dyn Subscribe>], &bus);

        bus.publish(Event::new(EventKind::ExecutorStarted));
        bus.publish(Event::new(EventKind::PostFailed));
        bus.publish(Event::new(EventKind::ExecutorStopped));
        bus.publish(Event::new(EventKind::PostFailed));
        set.join().await;

        assert_eq!(collect.kinds(), vec![EventKind::PostFailed]);
    }

    #[tokio::test]
    async fn test_workers_stop_when_the_bus_is_dropped() {
        let bus = Bus::new(8);
        let collect = Arc::new(Collect::default());
        let set = SubscriberSet::attach(vec![collect.clone() as Arc<dyn Subscribe>], &bus);

        bus.publish(Event::new(EventKind::ExecutorStarted));
        drop(bus);
        set.join().await;

        assert_eq!(collect.kinds(), vec![EventKind::ExecutorStarted]);
    }
}
