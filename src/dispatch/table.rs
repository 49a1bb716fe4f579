//! # Direct handler table.
//!
//! [`HandlerTable`] skips reflection entirely: each key maps to a pre-bound
//! handler over one shared state value. Nothing is validated at registration
//! and re-registering a key replaces the previous handler.

use std::any::Any;
use std::collections::HashMap;

use crate::dispatch::{Dispatch, Payload, downcast_arg, downcast_reply};
use crate::error::{CallError, HandlerError};

type HandleFn<S> =
    Box<dyn FnMut(&mut S, &str, Payload, Option<&mut dyn Any>) -> Result<(), CallError> + Send>;
type TickHandle<S> = Box<dyn FnMut(&mut S, i32) + Send>;

/// Key → handler map over a state value `S`.
///
/// # Example
/// ```
/// use mailroom::{Dispatch, HandlerTable};
///
/// let mut table = HandlerTable::new(0_u64);
/// table.register_handle("bump", |n: &mut u64, by: u64, total: &mut u64| {
///     *n += by;
///     *total = *n;
///     Ok::<(), String>(())
/// });
///
/// let mut total = 0_u64;
/// table.handle("bump", Box::new(2_u64), &mut total).unwrap();
/// table.post("bump", Box::new(3_u64)).unwrap();
/// assert_eq!(total, 2);
/// assert_eq!(*table.state(), 5);
/// ```
pub struct HandlerTable<S = ()> {
    state: S,
    handlers: HashMap<String, HandleFn<S>>,
    tick: Option<TickHandle<S>>,
}

impl<S: Send + 'static> HandlerTable<S> {
    /// Creates an empty table owning `state`.
    pub fn new(state: S) -> Self {
        Self {
            state,
            handlers: HashMap::new(),
            tick: None,
        }
    }

    /// Binds `method` to `f`, replacing any previous handler for that key.
    ///
    /// When invoked through a post, `f` receives a fresh `R::default()` slot
    /// that is discarded afterwards.
    pub fn register_handle<A, R, E, F>(&mut self, method: impl Into<String>, mut f: F) -> &mut Self
    where
        A: Any + Send,
        R: Any + Default,
        E: Into<HandlerError>,
        F: FnMut(&mut S, A, &mut R) -> Result<(), E> + Send + 'static,
    {
        let handler: HandleFn<S> = Box::new(move |state, key, arg, reply| {
            let arg = downcast_arg::<A>(key, arg)?;
            let result = match reply {
                Some(reply) => f(state, arg, downcast_reply::<R>(key, reply)?),
                None => f(state, arg, &mut R::default()),
            };
            result.map_err(|e| CallError::Handler(e.into()))
        });
        self.handlers.insert(method.into(), handler);
        self
    }

    /// Installs the tick handler; the executor then ticks this table.
    pub fn set_tick_handle<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&mut S, i32) + Send + 'static,
    {
        self.tick = Some(Box::new(f));
        self
    }

    /// Runs the handler bound to `method` with the caller's reply slot.
    ///
    /// # Errors
    /// [`CallError::MethodNotFound`] for an unknown key, otherwise whatever
    /// the handler (or the argument downcast) returned.
    pub fn handle(&mut self, method: &str, arg: Payload, reply: &mut dyn Any) -> Result<(), CallError> {
        self.dispatch(method, arg, Some(reply))
    }

    fn dispatch(
        &mut self,
        method: &str,
        arg: Payload,
        reply: Option<&mut dyn Any>,
    ) -> Result<(), CallError> {
        match self.handlers.get_mut(method) {
            Some(handler) => handler(&mut self.state, method, arg, reply),
            None => Err(CallError::MethodNotFound { key: method.to_string() }),
        }
    }

    /// Returns `true` if a handler is bound to `method`.
    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Consumes the table, returning its state.
    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S: Default + Send + 'static> Default for HandlerTable<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Send + 'static> Dispatch for HandlerTable<S> {
    fn call(&mut self, method: &str, arg: Payload, reply: &mut dyn Any) -> Result<(), CallError> {
        self.dispatch(method, arg, Some(reply))
    }

    fn post(&mut self, method: &str, arg: Payload) -> Result<(), CallError> {
        self.dispatch(method, arg, None)
    }

    fn has_tick(&self) -> bool {
        self.tick.is_some()
    }

    fn tick(&mut self, elapsed_ms: i32) {
        if let Some(tick) = self.tick.as_mut() {
            tick(&mut self.state, elapsed_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scores {
        points: HashMap<String, i64>,
        elapsed: i64,
    }

    fn table() -> HandlerTable<Scores> {
        let mut table = HandlerTable::<Scores>::default();
        table
            .register_handle("score", |s: &mut Scores, (who, n): (String, i64), total: &mut i64| {
                let entry = s.points.entry(who).or_default();
                *entry += n;
                *total = *entry;
                Ok::<(), String>(())
            })
            .register_handle("reset", |s: &mut Scores, who: String, _: &mut ()| {
                match s.points.remove(&who) {
                    Some(_) => Ok(()),
                    None => Err(format!("no score for {who}")),
                }
            });
        table
    }

    #[test]
    fn test_handle_and_post() {
        let mut table = table();
        let mut total = 0_i64;
        table
            .handle("score", Box::new(("ada".to_string(), 3_i64)), &mut total)
            .expect("score");
        table
            .post("score", Box::new(("ada".to_string(), 4_i64)))
            .expect("post score");
        assert_eq!(total, 3);
        assert_eq!(table.state().points["ada"], 7);

        let err = table.post("reset", Box::new("bob".to_string())).unwrap_err();
        assert_eq!(err.to_string(), "no score for bob");
    }

    #[test]
    fn test_unknown_method_and_bad_types() {
        let mut table = table();
        let mut total = 0_i64;

        let err = table.handle("missing", Box::new(()), &mut total).unwrap_err();
        assert_eq!(err.to_string(), "can't find method missing");

        let err = table.handle("score", Box::new(5_i64), &mut total).unwrap_err();
        assert!(matches!(err, CallError::InvalidArgument { .. }));

        let mut wrong = String::new();
        let err = table
            .handle("score", Box::new(("ada".to_string(), 1_i64)), &mut wrong)
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidArgument { .. }));
        assert!(table.state().points.is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut table = table();
        table.register_handle("score", |_: &mut Scores, _: (String, i64), total: &mut i64| {
            *total = -1;
            Ok::<(), String>(())
        });
        assert_eq!(table.len(), 2);

        let mut total = 0_i64;
        table
            .handle("score", Box::new(("ada".to_string(), 3_i64)), &mut total)
            .expect("score");
        assert_eq!(total, -1);
        assert!(table.state().points.is_empty());
    }

    #[test]
    fn test_tick_handle() {
        let mut table = table();
        assert!(!table.has_tick());

        table.set_tick_handle(|s: &mut Scores, ms| s.elapsed += i64::from(ms));
        assert!(table.has_tick());
        table.tick(10);
        table.tick(12);
        assert_eq!(table.into_state().elapsed, 22);
    }
}
