//! # Executor: the single consumer of a mailbox.
//!
//! Owns a [`Dispatch`] backend and services queued envelopes one at a time,
//! in arrival order. All callers go through cloned [`ExecutorHandle`]s.
//!
//! ## Loop
//! ```text
//! publish ExecutorStarted
//! loop {
//!   select! { biased;
//!     token.cancelled() ─► break "closed"
//!     tick interval     ─► backend.tick(elapsed_ms)      (only if has_tick)
//!     mailbox.recv()    ─► Some(env) ─► service(env)
//!                          None      ─► break "disconnected"
//!   }
//! }
//! drain: close mailbox, fail queued calls (Closed), drop queued posts (TaskDropped)
//! publish ExecutorStopped{ reason, count = drained }
//! return backend
//! ```
//!
//! ## Servicing one envelope
//! ```text
//! post:  backend.post(method, arg)  ── Err ──► PostFailed
//! call:  send deadline (if timed) ──► backend.call(method, arg, slot)
//!        └─► completion.send((slot, result)) ── receiver gone ──► CallAbandoned
//! ```
//!
//! ## Rules
//! - Exactly one envelope is serviced at a time; ticks never overlap dispatch.
//! - The deadline is sent right before dispatch, so queueing time is free.
//! - The envelope being serviced when `close()` is called completes normally.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::Options;
use super::envelope::{Envelope, Reply};
use super::handle::ExecutorHandle;
use crate::dispatch::{Dispatch, Registry, Service};
use crate::error::{CallError, RegisterError};
use crate::events::{Bus, Event, EventKind};

/// Serializes calls onto one backend.
///
/// # Example
/// ```
/// use mailroom::{Executor, HandlerTable, Options};
///
/// #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
/// async fn main() {
///     let mut table = HandlerTable::new(Vec::<String>::new());
///     table.register_handle("push", |log: &mut Vec<String>, line: String, len: &mut usize| {
///         log.push(line);
///         *len = log.len();
///         Ok::<(), String>(())
///     });
///
///     let exec = Executor::new(table, Options::default());
///     let handle = exec.handle();
///     let running = exec.spawn();
///
///     handle.post("push", "first".to_string()).await;
///     let len: usize = handle.request("push", "second".to_string()).await.unwrap();
///     assert_eq!(len, 2);
///
///     handle.close();
///     let table = running.await.unwrap();
///     assert_eq!(table.state().len(), 2);
/// }
/// ```
pub struct Executor<D> {
    options: Options,
    backend: D,
    rx: mpsc::Receiver<Envelope>,
    handle: ExecutorHandle,
    bus: Bus,
}

impl<D: Dispatch> Executor<D> {
    /// Creates an executor over `backend` with its own diagnostic bus.
    ///
    /// Sentinel values in `options` are resolved here; the options are
    /// read-only afterwards.
    ///
    /// No subscribers are attached. Errors with no caller to return to
    /// (failed posts, skipped methods, abandoned calls) are only visible on
    /// [`bus`](Self::bus); subscribe to it, or use [`ExecutorBuilder`](crate::ExecutorBuilder)
    /// to attach [`Subscribe`](crate::Subscribe) implementations.
    pub fn new(backend: D, options: Options) -> Self {
        let bus = Bus::new(options.bus_capacity_clamped());
        Self::from_parts(backend, options, bus)
    }

    pub(crate) fn from_parts(backend: D, options: Options, bus: Bus) -> Self {
        let options = options.resolved();
        let (tx, rx) = mpsc::channel(options.capacity());
        let handle = ExecutorHandle::new(
            tx,
            CancellationToken::new(),
            bus.clone(),
            options.call_timeout(),
        );
        Self {
            options,
            backend,
            rx,
            handle,
            bus,
        }
    }

    /// Returns a new handle for submitting work.
    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Effective options (sentinels resolved).
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn backend(&self) -> &D {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut D {
        &mut self.backend
    }

    /// Diagnostic bus; subscribe before running to observe every event.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs the loop on a dedicated blocking thread of the current runtime.
    ///
    /// The join handle resolves to the backend once the loop has stopped.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn spawn(self) -> JoinHandle<D> {
        let rt = Handle::current();
        tokio::task::spawn_blocking(move || rt.block_on(self.run()))
    }

    /// Runs the loop on the current task until closed, or until every
    /// handle is dropped. Returns the backend.
    pub async fn run(self) -> D {
        let Self {
            options,
            mut backend,
            mut rx,
            handle,
            bus,
        } = self;
        let token = handle.token().clone();
        drop(handle);

        let timeout = options.call_timeout();
        let mut last_tick = Instant::now();
        let mut ticker = backend
            .has_tick()
            .then(|| tick_interval(last_tick, options.tick_interval()));

        bus.publish(Event::new(EventKind::ExecutorStarted));

        let reason = loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break "closed",
                now = next_tick(&mut ticker) => {
                    let elapsed = now.saturating_duration_since(last_tick);
                    last_tick = now;
                    backend.tick(elapsed_ms(elapsed));
                }
                env = rx.recv() => match env {
                    Some(env) => service(&mut backend, env, timeout, &bus),
                    None => break "disconnected",
                },
            }
        };

        let drained = drain(&mut rx, &bus);
        bus.publish(
            Event::new(EventKind::ExecutorStopped)
                .with_reason(reason)
                .with_count(drained),
        );
        backend
    }
}

impl Executor<Registry> {
    /// Creates an executor over an empty [`Registry`] sharing its bus.
    pub fn reflective(options: Options) -> Self {
        let bus = Bus::new(options.bus_capacity_clamped());
        Self::from_parts(Registry::new(bus.clone()), options, bus)
    }

    /// Registers an owned service. See [`Registry::register`].
    pub fn register<S: Service>(&mut self, service: S) -> Result<(), RegisterError> {
        self.backend.register(service)
    }

    /// Registers a shared service. See [`Registry::register_shared`].
    pub fn register_shared<S: Service + Sync>(
        &mut self,
        service: std::sync::Arc<S>,
    ) -> Result<(), RegisterError> {
        self.backend.register_shared(service)
    }
}

fn tick_interval(start: Instant, period: Duration) -> Interval {
    let mut interval = time::interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

fn elapsed_ms(elapsed: Duration) -> i32 {
    i32::try_from(elapsed.as_millis()).unwrap_or(i32::MAX)
}

fn service<D: Dispatch>(backend: &mut D, env: Envelope, timeout: Option<Duration>, bus: &Bus) {
    let Envelope { method, arg, reply } = env;
    match reply {
        None => {
            if let Err(err) = backend.post(&method, arg) {
                bus.publish(
                    Event::new(EventKind::PostFailed)
                        .with_method(method)
                        .with_reason(err.to_string()),
                );
            }
        }
        Some(Reply {
            mut slot,
            done,
            timer,
        }) => {
            if let (Some(timer), Some(timeout)) = (timer, timeout) {
                let _ = timer.send(Instant::now() + timeout);
            }
            let result = backend.call(&method, arg, &mut *slot);
            if let Err((_, result)) = done.send((slot, result)) {
                let mut ev = Event::new(EventKind::CallAbandoned).with_method(method);
                if let Err(err) = result {
                    ev = ev.with_reason(err.to_string());
                }
                bus.publish(ev);
            }
        }
    }
}

fn drain(rx: &mut mpsc::Receiver<Envelope>, bus: &Bus) -> usize {
    rx.close();
    let mut drained = 0;
    while let Ok(env) = rx.try_recv() {
        drained += 1;
        match env.reply {
            Some(Reply { slot, done, .. }) => {
                let _ = done.send((slot, Err(CallError::Closed { method: env.method })));
            }
            None => bus.publish(Event::new(EventKind::TaskDropped).with_method(env.method)),
        }
    }
    drained
}
