//! # mailroom
//!
//! **Mailroom** serializes concurrent calls onto a single execution context.
//!
//! Many tasks invoke named operations on state owned by one executor; the
//! operation bodies run one at a time, in arrival order, on one dedicated
//! consumer. State registered with an executor needs no locks of its own.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │ExecutorHandle│   │ExecutorHandle│   │ExecutorHandle│
//!   │  (task #1)   │   │  (task #2)   │   │  (task #3)   │
//!   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!          │ post / call      │                  │
//!          ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Mailbox (bounded mpsc, FIFO, producers wait while full)          │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Executor loop (one dedicated thread)                             │
//! │  - services one envelope at a time                                │
//! │  - sends the call deadline right before dispatch                  │
//! │  - ticks the backend every tick interval                          │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                    ┌──────────────────────────────┐
//!                    │       Dispatch backend       │
//!                    ├──────────────┬───────────────┤
//!                    │   Registry   │ HandlerTable  │
//!                    │"Svc.Method"  │ "key" → fn    │
//!                    └──────────────┴───────────────┘
//!
//! Registry / Executor / Handles ── Event ──► Bus ──► one receiver per subscriber
//! ```
//!
//! ### Call lifecycle
//! ```text
//! handle.call(method, arg, &mut reply)
//!   ├─► envelope{ method, arg, slot, done, timer } ──► mailbox
//!   │                                   (waits for capacity)
//!   ├─► executor dequeues
//!   │       ├─► timer.send(now + timeout)
//!   │       ├─► backend.call(method, arg, slot)
//!   │       └─► done.send((slot, result))
//!   └─► caller: first of { done, sleep_until(deadline) }
//!           ├─ done     ─► reply = slot, return result
//!           └─ deadline ─► Timeout (late result discarded)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                        |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Executor**      | Mailbox, loop, timeout race, tick, shutdown.                  | [`Executor`], [`ExecutorHandle`]          |
//! | **Registry**      | Services declare methods once; keys are `"Service.Method"`.   | [`Registry`], [`Service`], [`Methods`]    |
//! | **Handler table** | Pre-bound handlers over one state value, no validation.       | [`HandlerTable`]                          |
//! | **Backends**      | Plug in any dispatch strategy.                                | [`Dispatch`]                              |
//! | **Subscriber API**| Observe registration and dispatch events.                     | [`Subscribe`], [`Event`], [`EventKind`]   |
//! | **Errors**        | Typed errors for registration and calls.                      | [`RegisterError`], [`CallError`]          |
//! | **Configuration** | Mailbox size, call timeout, tick interval.                    | [`Options`]                               |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` _(demo/reference only)_ and
//!   makes it the default subscriber of [`ExecutorBuilder`].
//!
//! ## Example
//! ```rust
//! use mailroom::{ExecutorBuilder, Methods, Options, Service};
//!
//! #[derive(Default)]
//! struct Guild {
//!     members: Vec<String>,
//! }
//!
//! impl Guild {
//!     fn join(&mut self, name: String) -> Result<(), String> {
//!         if self.members.len() >= 2 {
//!             return Err(format!("guild is full, {name} cannot join"));
//!         }
//!         self.members.push(name);
//!         Ok(())
//!     }
//!
//!     fn count(&self, _: (), n: &mut usize) -> Result<(), String> {
//!         *n = self.members.len();
//!         Ok(())
//!     }
//! }
//!
//! impl Service for Guild {
//!     fn methods(m: &mut Methods<Self>) {
//!         m.post("Join", Guild::join).call_ref("Count", Guild::count);
//!     }
//! }
//!
//! #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // With the `logging` feature a LogWriter is attached by default.
//!     let mut exec = ExecutorBuilder::new(Options::default()).build_reflective();
//!     exec.register(Guild::default())?;
//!
//!     let handle = exec.handle();
//!     let running = exec.spawn();
//!
//!     for name in ["ada", "grace", "linus"] {
//!         handle.post("Guild.Join", name.to_string()).await;
//!     }
//!     let count: usize = handle.request("Guild.Count", ()).await?;
//!     assert_eq!(count, 2);
//!
//!     handle.close();
//!     let registry = running.await?;
//!     assert_eq!(registry.get::<Guild>().map(|g| g.members.len()), Some(2));
//!     Ok(())
//! }
//! ```
mod core;
mod dispatch;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_MAILBOX_CAPACITY, DEFAULT_TICK_INTERVAL_MS, Executor,
    ExecutorBuilder, ExecutorHandle, NO_CALL_TIMEOUT, Options,
};
pub use dispatch::{Dispatch, HandlerTable, Methods, Payload, Registry, Service};
pub use error::{CallError, HandlerError, RegisterError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
