//! Runtime core: mailbox, executor loop and caller handles.
//!
//! The public API from this module is [`Executor`], [`ExecutorHandle`],
//! [`ExecutorBuilder`] and [`Options`].
//!
//! Internal modules:
//! - [`envelope`]: one queued unit of work and its reply channels;
//! - [`handle`]: post/call/close from any task, with the timeout race;
//! - [`executor`]: the single consumer loop, tick scheduling and drain;
//! - [`builder`]: wires the diagnostic bus to subscribers;
//! - [`config`]: options and their defaults.

mod builder;
mod config;
mod envelope;
mod executor;
mod handle;

pub use builder::ExecutorBuilder;
pub use config::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_MAILBOX_CAPACITY, DEFAULT_TICK_INTERVAL_MS, NO_CALL_TIMEOUT,
    Options,
};
pub use executor::Executor;
pub use handle::ExecutorHandle;
