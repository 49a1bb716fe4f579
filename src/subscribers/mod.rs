//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and (with the `logging` feature) a demo [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Registry / Executor / Handles ── publish(Event) ──► Bus
//!                                                      │ one receiver each
//!                                            ┌─────────┼─────────┐
//!                                            ▼         ▼         ▼
//!                                        LogWriter  Metrics   Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
