//! # LogWriter — simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [registered] service="Roster" methods=3
//! [method-skipped] method="Roster.add" reason="method \"add\" is not exported"
//! [started]
//! [post-failed] method="Roster.Kick" err="no such member"
//! [timeout] method="Roster.Sync" timeout_ms=1000
//! [stopped] reason="closed" drained=2
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let method = e.method.as_deref().unwrap_or("unknown");
        let service = e.service.as_deref().unwrap_or("unknown");
        let subscriber = e.subscriber.unwrap_or("unknown");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ServiceRegistered => {
                println!("[registered] service={service:?} methods={:?}", e.count);
            }
            EventKind::MethodSkipped => {
                println!("[method-skipped] method={method:?} reason={reason:?}");
            }
            EventKind::RegistrationRejected => {
                println!("[registration-rejected] service={service:?} err={reason:?}");
            }
            EventKind::ExecutorStarted => println!("[started]"),
            EventKind::ExecutorStopped => {
                println!("[stopped] reason={reason:?} drained={:?}", e.count);
            }
            EventKind::PostFailed => println!("[post-failed] method={method:?} err={reason:?}"),
            EventKind::PostRejected => println!("[post-rejected] method={method:?}"),
            EventKind::TimeoutHit => {
                println!("[timeout] method={method:?} timeout_ms={:?}", e.timeout_ms);
            }
            EventKind::CallAbandoned => {
                println!("[call-abandoned] method={method:?} err={reason:?}");
            }
            EventKind::TaskDropped => println!("[dropped] method={method:?}"),
            EventKind::SubscriberLagged => {
                println!("[subscriber-lagged] subscriber={subscriber} missed={:?}", e.count);
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] subscriber={subscriber} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
