//! Mailbox unit of work.
//!
//! An [`Envelope`] is built once per `post`/`call`, queued, and consumed once
//! by the executor loop. A synchronous envelope carries a [`Reply`], which
//! keeps the caller's result slot together with its completion sender so one
//! never travels without the other.

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::dispatch::Payload;
use crate::error::CallError;

/// Returned to the caller: its result slot and the dispatch outcome.
pub(crate) type Completion = (Payload, Result<(), CallError>);

pub(crate) struct Reply {
    pub(crate) slot: Payload,
    pub(crate) done: oneshot::Sender<Completion>,
    /// Receives the service deadline when the executor starts the call.
    pub(crate) timer: Option<oneshot::Sender<Instant>>,
}

pub(crate) struct Envelope {
    pub(crate) method: String,
    pub(crate) arg: Payload,
    pub(crate) reply: Option<Reply>,
}

/// Caller side of a synchronous envelope.
pub(crate) struct Pending {
    pub(crate) done: oneshot::Receiver<Completion>,
    pub(crate) timer: Option<oneshot::Receiver<Instant>>,
}

impl Envelope {
    /// Fire-and-forget envelope.
    pub(crate) fn post(method: String, arg: Payload) -> Self {
        Self {
            method,
            arg,
            reply: None,
        }
    }

    /// Synchronous envelope; `timed` adds the deadline channel.
    pub(crate) fn call(method: String, arg: Payload, slot: Payload, timed: bool) -> (Self, Pending) {
        let (done_tx, done_rx) = oneshot::channel();
        let (timer_tx, timer_rx) = if timed {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let env = Self {
            method,
            arg,
            reply: Some(Reply {
                slot,
                done: done_tx,
                timer: timer_tx,
            }),
        };
        (
            env,
            Pending {
                done: done_rx,
                timer: timer_rx,
            },
        )
    }

    /// Gives the result slot back when the envelope never reached the executor.
    pub(crate) fn into_slot(self) -> Option<Payload> {
        self.reply.map(|r| r.slot)
    }
}
