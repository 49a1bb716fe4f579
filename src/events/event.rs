//! # Diagnostic events emitted by the executor and its backends.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Registration events**: what the registry accepted, skipped or rejected
//! - **Dispatch events**: failures nobody else would see (posts, abandoned calls)
//! - **Lifecycle events**: executor start/stop and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! method key, the service or subscriber it concerns and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use mailroom::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::PostFailed)
//!     .with_method("Roster.Add")
//!     .with_reason("roster is full");
//!
//! assert_eq!(ev.kind, EventKind::PostFailed);
//! assert_eq!(ev.method.as_deref(), Some("Roster.Add"));
//! assert_eq!(ev.reason.as_deref(), Some("roster is full"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked while handling an event; its worker keeps going.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber fell behind the bus and missed events.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `count`: number of events it missed
    SubscriberLagged,

    // === Registration events ===
    /// A service passed validation and was added to the registry.
    ///
    /// Sets:
    /// - `service`: service name
    /// - `count`: number of eligible methods
    ServiceRegistered,

    /// A declared method failed validation and was left out.
    ///
    /// Sets:
    /// - `service`: service name
    /// - `method`: `Service.Method` key
    /// - `reason`: which rule rejected it
    MethodSkipped,

    /// Registration of a whole service failed.
    ///
    /// Sets:
    /// - `service`: service name (or the full type name if unnamed)
    /// - `reason`: the [`RegisterError`](crate::RegisterError) message
    RegistrationRejected,

    // === Executor lifecycle ===
    /// The consumer loop started.
    ExecutorStarted,

    /// The consumer loop exited.
    ///
    /// Sets:
    /// - `reason`: `"closed"` (explicit close) or `"disconnected"` (all handles dropped)
    /// - `count`: envelopes drained after exit
    ExecutorStopped,

    // === Dispatch events ===
    /// A fire-and-forget dispatch returned an error.
    ///
    /// Sets:
    /// - `method`: method key
    /// - `reason`: error message
    PostFailed,

    /// A fire-and-forget envelope could not be enqueued (executor closed).
    ///
    /// Sets:
    /// - `method`: method key
    PostRejected,

    /// A call's service time exceeded its timeout.
    ///
    /// Sets:
    /// - `method`: method key
    /// - `timeout_ms`: configured timeout (ms)
    TimeoutHit,

    /// The executor finished a call whose caller had already given up.
    ///
    /// Sets:
    /// - `method`: method key
    /// - `reason`: dispatch outcome, when it was an error
    CallAbandoned,

    /// A queued envelope was discarded during shutdown.
    ///
    /// Sets:
    /// - `method`: method key
    TaskDropped,
}

/// Diagnostic event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Method key (`"Service.Method"` or a handler table key).
    pub method: Option<Arc<str>>,
    /// Registry service name.
    pub service: Option<Arc<str>>,
    /// Name of the subscriber an event is about.
    pub subscriber: Option<&'static str>,
    /// Human-readable reason (error or panic message, stop reason).
    pub reason: Option<Arc<str>>,
    /// Call timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Kind-specific counter (eligible methods, drained envelopes).
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            method: None,
            service: None,
            subscriber: None,
            reason: None,
            timeout_ms: None,
            count: None,
        }
    }

    /// Attaches a method key.
    #[inline]
    pub fn with_method(mut self, method: impl Into<Arc<str>>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[inline]
    pub fn with_subscriber(mut self, subscriber: &'static str) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Returns `true` for the event that ends an executor's stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::ExecutorStopped
    }
}
