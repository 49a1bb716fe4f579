//! # Caller side of an executor.
//!
//! [`ExecutorHandle`] is the cloneable front door: any number of tasks hold
//! one and submit work through it. Every submission becomes one envelope in
//! the bounded mailbox.
//!
//! ## Call flow
//! ```text
//! call(method, arg, &mut reply)
//!   ├─► move reply into the envelope (slot)
//!   ├─► reserve mailbox capacity (waits while full; fails fast once closed)
//!   ├─► wait for the executor to start servicing ──► deadline
//!   └─► select! { biased;
//!          completion         ─► write slot back, return handler result
//!          sleep_until(deadline) ─► TimeoutHit, CallError::Timeout
//!       }
//! ```
//!
//! ## Rules
//! - Time spent queued never counts against the timeout.
//! - When the result and the deadline are ready together, the result wins.
//! - After a timeout the late result is discarded and the slot keeps `R::default()`.

use std::any::Any;
use std::mem;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;

use super::envelope::{Completion, Envelope, Pending};
use crate::dispatch::Payload;
use crate::error::CallError;
use crate::events::{Bus, Event, EventKind};

/// Cloneable handle for submitting work to an [`Executor`](crate::Executor).
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<Envelope>,
    token: CancellationToken,
    bus: Bus,
    timeout: Option<Duration>,
}

impl ExecutorHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<Envelope>,
        token: CancellationToken,
        bus: Bus,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            tx,
            token,
            bus,
            timeout,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Queues `method` without waiting for it to run.
    ///
    /// Waits only for mailbox capacity. Dispatch errors never come back here;
    /// they are published as [`EventKind::PostFailed`]. After [`close`](Self::close)
    /// the envelope is rejected and [`EventKind::PostRejected`] is published.
    pub async fn post<A: Any + Send>(&self, method: impl Into<String>, arg: A) {
        let env = Envelope::post(method.into(), Box::new(arg));
        if let Err(env) = self.enqueue(env).await {
            self.bus
                .publish(Event::new(EventKind::PostRejected).with_method(env.method));
        }
    }

    /// Alias of [`post`](Self::post).
    pub async fn go<A: Any + Send>(&self, method: impl Into<String>, arg: A) {
        self.post(method, arg).await;
    }

    /// Runs `method` on the executor and waits for its result.
    ///
    /// The current value of `reply` is handed to the method as its result
    /// slot and written back once the executor answers, whether the method
    /// succeeded or not.
    ///
    /// # Errors
    /// - [`CallError::Timeout`] if servicing took longer than the call timeout
    /// - [`CallError::Closed`] if the executor shut down first
    /// - lookup, argument and handler errors from the dispatch backend
    pub async fn call<A, R>(
        &self,
        method: impl Into<String>,
        arg: A,
        reply: &mut R,
    ) -> Result<(), CallError>
    where
        A: Any + Send,
        R: Any + Send + Default,
    {
        let method = method.into();
        let slot = Box::new(mem::take(reply));
        let (env, pending) =
            Envelope::call(method.clone(), Box::new(arg), slot, self.timeout.is_some());

        if let Err(env) = self.enqueue(env).await {
            if let Some(slot) = env.into_slot() {
                restore(reply, slot);
            }
            return Err(CallError::Closed { method });
        }

        match await_reply(&method, pending).await {
            Ok((slot, result)) => {
                restore(reply, slot);
                result
            }
            Err(err) => {
                if let (CallError::Timeout { .. }, Some(timeout)) = (&err, self.timeout) {
                    self.bus.publish(
                        Event::new(EventKind::TimeoutHit)
                            .with_method(method.as_str())
                            .with_timeout(timeout),
                    );
                }
                Err(err)
            }
        }
    }

    /// [`call`](Self::call) with a fresh `R::default()` slot, returned on success.
    pub async fn request<A, R>(&self, method: impl Into<String>, arg: A) -> Result<R, CallError>
    where
        A: Any + Send,
        R: Any + Send + Default,
    {
        let mut reply = R::default();
        self.call(method, arg, &mut reply).await?;
        Ok(reply)
    }

    /// Stops the executor. Calling it again has no further effect.
    ///
    /// The envelope being serviced finishes; queued ones are drained with
    /// [`CallError::Closed`] (calls) or [`EventKind::TaskDropped`] (posts).
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn enqueue(&self, env: Envelope) -> Result<(), Envelope> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(env),
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(env);
                    Ok(())
                }
                Err(_) => Err(env),
            },
        }
    }
}

impl std::fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("closed", &self.is_closed())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn restore<R: Any>(reply: &mut R, slot: Payload) {
    if let Ok(value) = slot.downcast::<R>() {
        *reply = *value;
    }
}

/// Waits for the completion, bounded by the deadline once servicing starts.
async fn await_reply(method: &str, pending: Pending) -> Result<Completion, CallError> {
    let Pending { mut done, timer } = pending;
    let closed = || CallError::Closed {
        method: method.to_string(),
    };

    let Some(timer) = timer else {
        return done.await.map_err(|_| closed());
    };

    let deadline = tokio::select! {
        biased;
        res = &mut done => return res.map_err(|_| closed()),
        deadline = timer => deadline.ok(),
    };
    let Some(deadline) = deadline else {
        // drained before servicing
        return done.await.map_err(|_| closed());
    };

    tokio::select! {
        biased;
        res = &mut done => res.map_err(|_| closed()),
        () = sleep_until(deadline) => Err(CallError::Timeout {
            method: method.to_string(),
        }),
    }
}
