use std::sync::Arc;

use super::config::Options;
use super::executor::Executor;
use crate::dispatch::{Dispatch, Registry};
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for executors with event subscribers.
///
/// Failed posts and other errors without a caller only surface as events.
/// With the `logging` feature the builder starts with a `LogWriter`
/// so they are printed; without it, nothing sees them unless subscribers are set.
pub struct ExecutorBuilder {
    options: Options,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ExecutorBuilder {
    /// Creates a new builder with the given options.
    pub fn new(options: Options) -> Self {
        Self {
            options,
            subscribers: default_subscribers(),
        }
    }

    /// Replaces the event subscribers, including the default `LogWriter`.
    ///
    /// Each subscriber is fed by its own worker from its own bus receiver.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds an executor over `backend`.
    ///
    /// Must be called from within a tokio runtime when any subscriber is set
    /// (always, with the `logging` feature).
    pub fn build<D: Dispatch>(self, backend: D) -> Executor<D> {
        let bus = self.wire();
        Executor::from_parts(backend, self.options, bus)
    }

    /// Builds an executor over an empty [`Registry`] publishing to the same bus.
    pub fn build_reflective(self) -> Executor<Registry> {
        let bus = self.wire();
        Executor::from_parts(Registry::new(bus.clone()), self.options, bus)
    }

    /// Creates the bus and attaches the subscribers to it.
    ///
    /// Workers stop on their own after `ExecutorStopped`.
    fn wire(&self) -> Bus {
        let bus = Bus::new(self.options.bus_capacity_clamped());
        if !self.subscribers.is_empty() {
            let _workers = SubscriberSet::attach(self.subscribers.clone(), &bus);
        }
        bus
    }
}

#[cfg(feature = "logging")]
fn default_subscribers() -> Vec<Arc<dyn Subscribe>> {
    vec![Arc::new(crate::subscribers::LogWriter::new())]
}

#[cfg(not(feature = "logging"))]
fn default_subscribers() -> Vec<Arc<dyn Subscribe>> {
    Vec::new()
}
