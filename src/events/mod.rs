//! Diagnostic events: types and broadcast bus.
//!
//! This is the operator-visible channel of the crate. Anything that has no
//! caller to report to (failed posts, skipped methods, abandoned calls) ends
//! up here as an [`Event`].
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`

mod bus;
mod event;

pub(crate) use bus::WeakBus;
pub use bus::Bus;
pub use event::{Event, EventKind};
