//! # Observing an executor.
//!
//! A [`Subscribe`] implementation sees what the executor cannot report to a
//! caller: skipped methods, failed posts, abandoned calls, shutdown counts.
//! Pass subscribers to [`ExecutorBuilder::with_subscribers`](crate::ExecutorBuilder::with_subscribers);
//! each one is fed from its own bus receiver by its own task, in publish order.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use async_trait::async_trait;
//! use mailroom::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct FailedPosts(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for FailedPosts {
//!     async fn on_event(&self, _ev: &Event) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!
//!     fn interested(&self, kind: EventKind) -> bool {
//!         kind == EventKind::PostFailed
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Receives executor events.
///
/// `on_event` runs on the subscriber's own task; it may await, but a
/// subscriber that falls behind the bus capacity misses events and a
/// [`EventKind::SubscriberLagged`] report is published instead.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. A panic here is caught and published as
    /// [`EventKind::SubscriberPanicked`].
    async fn on_event(&self, event: &Event);

    /// Filters events before `on_event`. Everything by default.
    ///
    /// `ExecutorStopped` still ends delivery when filtered out.
    fn interested(&self, kind: EventKind) -> bool {
        let _ = kind;
        true
    }

    /// Name used in lag and panic reports. Defaults to the type's own name.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}
