//! # Service method declarations and their validation.
//!
//! A [`Service`] lists its methods once, in [`Service::methods`], through the
//! [`Methods`] builder. Each declaration captures a typed function and turns
//! it into a type-erased invoker; the registry then keeps only the
//! declarations that pass [`check`].
//!
//! ## Shapes
//! ```text
//! post shape:  Fn(&mut S, A)          -> Result<(), E>   (fire-and-forget)
//! call shape:  Fn(&mut S, A, &mut R)  -> Result<(), E>   (request/reply)
//! tick:        Fn(&mut S, i32)                           (reserved name "Tick")
//! ```
//! `*_ref` variants take `&S` and stay reachable when the service is
//! registered shared (`Arc<S>`).
//!
//! ## Eligibility rules
//! - name is an identifier starting with an uppercase ASCII letter ("exported")
//! - argument and reply types are nameable (no closures or async blocks)
//! - methods taking `&mut S` need an owned receiver
//! - the first declaration of a name wins

use std::any::{Any, type_name};
use std::collections::HashMap;

use crate::dispatch::{Payload, downcast_arg, downcast_reply, is_identifier};
use crate::error::{CallError, HandlerError};

/// Method name reserved for the tick hook.
pub(crate) const TICK: &str = "Tick";

/// An object that can be registered with a [`Registry`](crate::Registry).
///
/// The service name is the type's own name (`Roster` for `my_app::Roster`).
///
/// # Example
/// ```
/// use mailroom::{Methods, Service};
///
/// #[derive(Default)]
/// struct Counter {
///     value: u64,
/// }
///
/// impl Counter {
///     fn add(&mut self, n: u64) -> Result<(), String> {
///         self.value += n;
///         Ok(())
///     }
///
///     fn get(&self, _: (), reply: &mut u64) -> Result<(), String> {
///         *reply = self.value;
///         Ok(())
///     }
/// }
///
/// impl Service for Counter {
///     fn methods(m: &mut Methods<Self>) {
///         m.post("Add", Counter::add).call_ref("Get", Counter::get);
///     }
/// }
/// ```
pub trait Service: Send + Sized + 'static {
    /// Declares the methods reachable through the registry.
    fn methods(methods: &mut Methods<Self>);
}

type ExclusiveFn<S> =
    Box<dyn Fn(&mut S, &str, Payload, Option<&mut dyn Any>) -> Result<(), CallError> + Send>;
type SharedFn<S> =
    Box<dyn Fn(&S, &str, Payload, Option<&mut dyn Any>) -> Result<(), CallError> + Send>;
pub(crate) type TickFn<S> = Box<dyn Fn(&mut S, i32) + Send>;

/// How a method reaches its receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Exclusive,
    Shared,
}

pub(crate) enum Invoke<S> {
    Exclusive(ExclusiveFn<S>),
    Shared(SharedFn<S>),
}

/// One validated (or candidate) method.
pub(crate) struct MethodType<S> {
    pub(crate) arg_type: &'static str,
    pub(crate) reply_type: Option<&'static str>,
    pub(crate) invoke: Invoke<S>,
}

impl<S> MethodType<S> {
    fn access(&self) -> Access {
        match self.invoke {
            Invoke::Exclusive(_) => Access::Exclusive,
            Invoke::Shared(_) => Access::Shared,
        }
    }
}

/// Builder collecting a service's method declarations.
pub struct Methods<S> {
    declared: Vec<(&'static str, MethodType<S>)>,
    tick: Option<TickFn<S>>,
}

impl<S: Send + 'static> Methods<S> {
    pub(crate) fn new() -> Self {
        Self {
            declared: Vec::new(),
            tick: None,
        }
    }

    /// Declares a request/reply method taking `&mut S`.
    pub fn call<A, R, E, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        A: Any + Send,
        R: Any,
        E: Into<HandlerError>,
        F: Fn(&mut S, A, &mut R) -> Result<(), E> + Send + 'static,
    {
        let invoke: ExclusiveFn<S> = Box::new(move |rcvr, key, arg, reply| {
            let (arg, reply) = unpack_call::<A, R>(key, arg, reply)?;
            f(rcvr, arg, reply).map_err(|e| CallError::Handler(e.into()))
        });
        self.declare::<A>(name, Some(type_name::<R>()), Invoke::Exclusive(invoke))
    }

    /// Declares a request/reply method taking `&S`.
    pub fn call_ref<A, R, E, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        A: Any + Send,
        R: Any,
        E: Into<HandlerError>,
        F: Fn(&S, A, &mut R) -> Result<(), E> + Send + 'static,
    {
        let invoke: SharedFn<S> = Box::new(move |rcvr, key, arg, reply| {
            let (arg, reply) = unpack_call::<A, R>(key, arg, reply)?;
            f(rcvr, arg, reply).map_err(|e| CallError::Handler(e.into()))
        });
        self.declare::<A>(name, Some(type_name::<R>()), Invoke::Shared(invoke))
    }

    /// Declares a fire-and-forget method taking `&mut S`.
    pub fn post<A, E, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        A: Any + Send,
        E: Into<HandlerError>,
        F: Fn(&mut S, A) -> Result<(), E> + Send + 'static,
    {
        let invoke: ExclusiveFn<S> = Box::new(move |rcvr, key, arg, reply| {
            let arg = unpack_post::<A>(key, arg, reply)?;
            f(rcvr, arg).map_err(|e| CallError::Handler(e.into()))
        });
        self.declare::<A>(name, None, Invoke::Exclusive(invoke))
    }

    /// Declares a fire-and-forget method taking `&S`.
    pub fn post_ref<A, E, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        A: Any + Send,
        E: Into<HandlerError>,
        F: Fn(&S, A) -> Result<(), E> + Send + 'static,
    {
        let invoke: SharedFn<S> = Box::new(move |rcvr, key, arg, reply| {
            let arg = unpack_post::<A>(key, arg, reply)?;
            f(rcvr, arg).map_err(|e| CallError::Handler(e.into()))
        });
        self.declare::<A>(name, None, Invoke::Shared(invoke))
    }

    /// Installs the tick hook, called with the milliseconds since the previous tick.
    pub fn tick<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut S, i32) + Send + 'static,
    {
        self.tick = Some(Box::new(f));
        self
    }

    fn declare<A>(
        &mut self,
        name: &'static str,
        reply_type: Option<&'static str>,
        invoke: Invoke<S>,
    ) -> &mut Self {
        self.declared.push((
            name,
            MethodType {
                arg_type: type_name::<A>(),
                reply_type,
                invoke,
            },
        ));
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<(&'static str, MethodType<S>)>, Option<TickFn<S>>) {
        (self.declared, self.tick)
    }
}

fn unpack_call<'a, A: Any, R: Any>(
    key: &str,
    arg: Payload,
    reply: Option<&'a mut dyn Any>,
) -> Result<(A, &'a mut R), CallError> {
    let Some(reply) = reply else {
        return Err(CallError::invalid(key, "method replies; use call instead of post"));
    };
    Ok((downcast_arg::<A>(key, arg)?, downcast_reply::<R>(key, reply)?))
}

fn unpack_post<A: Any>(key: &str, arg: Payload, reply: Option<&mut dyn Any>) -> Result<A, CallError> {
    if reply.is_some() {
        return Err(CallError::invalid(key, "method takes no reply slot; use post"));
    }
    downcast_arg::<A>(key, arg)
}

/// Applies the eligibility rules to one declaration.
///
/// Returns the reason for rejection, if any.
pub(crate) fn check<S>(name: &str, method: &MethodType<S>, receiver: Access) -> Result<(), String> {
    if !is_identifier(name) {
        return Err(format!("method name {name:?} is not an identifier"));
    }
    if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
        return Err(format!("method {name:?} is not exported"));
    }
    if !is_nameable(method.arg_type) {
        return Err(format!(
            "argument type of method {name:?} is not nameable: {:?}",
            method.arg_type
        ));
    }
    if let Some(reply) = method.reply_type.filter(|t| !is_nameable(t)) {
        return Err(format!("reply type of method {name:?} is not nameable: {reply:?}"));
    }
    if method.access() == Access::Exclusive && receiver == Access::Shared {
        return Err(format!("method {name:?} needs &mut self but the receiver is shared"));
    }
    Ok(())
}

/// Closures and async blocks have compiler-generated names.
fn is_nameable(type_name: &str) -> bool {
    !type_name.contains("{{")
}

/// Collects the declarations that pass [`check`], reporting the others.
///
/// `Tick` is skipped silently; a repeated name keeps the first declaration.
pub(crate) fn suitable_methods<S>(
    declared: Vec<(&'static str, MethodType<S>)>,
    receiver: Access,
    mut report: impl FnMut(&'static str, String),
) -> HashMap<&'static str, MethodType<S>> {
    let mut methods = HashMap::with_capacity(declared.len());
    for (name, method) in declared {
        if name == TICK {
            continue;
        }
        if let Err(reason) = check(name, &method, receiver) {
            report(name, reason);
            continue;
        }
        if methods.contains_key(name) {
            report(name, format!("method {name:?} declared twice; keeping the first"));
            continue;
        }
        methods.insert(name, method);
    }
    methods
}

/// Returns `true` if any declaration would pass with the given receiver.
pub(crate) fn any_suitable<S>(declared: &[(&'static str, MethodType<S>)], receiver: Access) -> bool {
    declared
        .iter()
        .any(|(name, method)| *name != TICK && check(name, method, receiver).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ledger {
        total: i64,
    }

    impl Ledger {
        fn deposit(&mut self, n: i64) -> Result<(), String> {
            self.total += n;
            Ok(())
        }

        fn balance(&self, _: (), reply: &mut i64) -> Result<(), String> {
            *reply = self.total;
            Ok(())
        }
    }

    fn declared() -> Vec<(&'static str, MethodType<Ledger>)> {
        let mut m = Methods::<Ledger>::new();
        m.post("Deposit", Ledger::deposit)
            .call_ref("Balance", Ledger::balance)
            .post("withdraw", Ledger::deposit)
            .post("Deposit", |l: &mut Ledger, n: i64| l.deposit(-n))
            .post("Tick", Ledger::deposit)
            .call("Weird", |_: &mut Ledger, _f: fn(), _r: &mut ()| Ok::<(), String>(()));
        m.into_parts().0
    }

    #[test]
    fn test_rules_applied_per_method() {
        let mut skipped = Vec::new();
        let methods = suitable_methods(declared(), Access::Exclusive, |name, reason| {
            skipped.push((name, reason));
        });

        let mut names: Vec<_> = methods.keys().copied().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Balance", "Deposit", "Weird"]);

        let skipped_names: Vec<_> = skipped.iter().map(|(n, _)| *n).collect();
        assert_eq!(skipped_names, vec!["withdraw", "Deposit"]);
        assert!(skipped[0].1.contains("not exported"));
        assert!(skipped[1].1.contains("declared twice"));
    }

    #[test]
    fn test_first_declaration_wins() {
        let methods = suitable_methods(declared(), Access::Exclusive, |_, _| {});
        let mut ledger = Ledger::default();
        let Invoke::Exclusive(f) = &methods["Deposit"].invoke else {
            panic!("Deposit takes &mut self");
        };
        f(&mut ledger, "Ledger.Deposit", Box::new(5_i64), None).expect("deposit");
        assert_eq!(ledger.total, 5);
    }

    #[test]
    fn test_shared_receiver_only_keeps_ref_methods() {
        let methods = suitable_methods(declared(), Access::Shared, |_, _| {});
        let names: Vec<_> = methods.keys().copied().collect();
        assert_eq!(names, vec!["Balance"]);
    }

    #[test]
    fn test_closure_argument_is_not_nameable() {
        let marker = 3;
        let mut m = Methods::<Ledger>::new();
        m.post("Capture", move |_: &mut Ledger, _: fn() -> i32| {
            let _ = marker;
            Ok::<(), String>(())
        });
        let closure = || 1;
        fn takes<T: Any + Send>(m: &mut Methods<Ledger>, _: T) {
            m.post("Closure", |_: &mut Ledger, _: T| Ok::<(), String>(()));
        }
        takes(&mut m, closure);

        let (declared, _) = m.into_parts();
        let reasons: Vec<_> = declared
            .iter()
            .map(|(name, method)| check(name, method, Access::Exclusive))
            .collect();
        assert!(reasons[0].is_ok());
        assert!(reasons[1].as_ref().unwrap_err().contains("not nameable"));
    }

    #[test]
    fn test_shape_mismatch_is_invalid_argument() {
        let methods = suitable_methods(declared(), Access::Exclusive, |_, _| {});
        let ledger = Ledger::default();
        let Invoke::Shared(f) = &methods["Balance"].invoke else {
            panic!("Balance takes &self");
        };

        let err = f(&ledger, "Ledger.Balance", Box::new(()), None).unwrap_err();
        assert!(matches!(err, CallError::InvalidArgument { .. }));

        let mut wrong = String::new();
        let err = f(&ledger, "Ledger.Balance", Box::new(()), Some(&mut wrong)).unwrap_err();
        assert!(err.to_string().contains("reply slot"));

        let mut ok = 0_i64;
        f(&ledger, "Ledger.Balance", Box::new(()), Some(&mut ok)).expect("balance");
    }
}
