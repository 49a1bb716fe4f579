//! Dispatch backends: how a method key becomes a function call.
//!
//! The executor never calls user code directly. It hands every dequeued
//! envelope to a [`Dispatch`] implementation, which owns the protected state:
//!
//! - [`Registry`]: services register themselves once; keys look like
//!   `"Service.Method"` and are validated against a method table built at
//!   registration time.
//! - [`HandlerTable`]: keys map straight to pre-bound handler functions over a
//!   single state value; no validation, last registration wins.
//!
//! Arguments and reply slots travel type-erased ([`Payload`], `&mut dyn Any`);
//! the typed adapters built at registration downcast them back.

mod methods;
mod registry;
mod table;

use std::any::{Any, type_name};

use crate::error::CallError;

pub use methods::{Methods, Service};
pub use registry::Registry;
pub use table::HandlerTable;

/// Type-erased argument or reply value carried by an envelope.
pub type Payload = Box<dyn Any + Send>;

/// A dispatch backend driven by the executor loop.
///
/// All methods run on the executor's single consumer, one at a time; an
/// implementation never needs internal locking.
pub trait Dispatch: Send + 'static {
    /// Invokes a request/reply method. `reply` is the caller's result slot.
    fn call(&mut self, method: &str, arg: Payload, reply: &mut dyn Any) -> Result<(), CallError>;

    /// Invokes a method without a result slot.
    fn post(&mut self, method: &str, arg: Payload) -> Result<(), CallError>;

    /// Returns `true` when [`tick`](Dispatch::tick) should be scheduled.
    fn has_tick(&self) -> bool {
        false
    }

    /// Periodic hook; `elapsed_ms` is the time since the previous tick.
    fn tick(&mut self, _elapsed_ms: i32) {}
}

pub(crate) fn downcast_arg<A: Any>(key: &str, arg: Payload) -> Result<A, CallError> {
    arg.downcast::<A>()
        .map(|a| *a)
        .map_err(|_| CallError::invalid(key, format!("argument is not {}", type_name::<A>())))
}

pub(crate) fn downcast_reply<'a, R: Any>(
    key: &str,
    reply: &'a mut dyn Any,
) -> Result<&'a mut R, CallError> {
    reply
        .downcast_mut::<R>()
        .ok_or_else(|| CallError::invalid(key, format!("reply slot is not &mut {}", type_name::<R>())))
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
