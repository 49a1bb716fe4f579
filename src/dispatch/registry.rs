//! # Reflective service registry.
//!
//! [`Registry`] maps service names to registered receivers and their
//! validated method tables. Keys are `"Service.Method"`; the split happens at
//! the last `.`.
//!
//! ```text
//! register(Roster) ──► Methods<Roster> ──► check() ──► services["Roster"]
//!                                             │
//!                                             └─► MethodSkipped events
//!
//! call("Roster.Add") ──► split ──► services["Roster"] ──► methods["Add"] ──► invoke
//! ```
//!
//! Owned receivers reach every method; shared receivers (`Arc<S>`) only reach
//! methods declared with `call_ref`/`post_ref` and cannot tick.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::methods::{
    Access, Invoke, MethodType, Methods, Service, TICK, TickFn, any_suitable, suitable_methods,
};
use crate::dispatch::{Dispatch, Payload, is_identifier};
use crate::error::{CallError, RegisterError};
use crate::events::{Bus, Event, EventKind};

/// Type-erased registered service.
trait ServiceObject: Send {
    fn invoke(
        &mut self,
        method: &str,
        key: &str,
        arg: Payload,
        reply: Option<&mut dyn Any>,
    ) -> Result<(), CallError>;

    fn has_tick(&self) -> bool;

    fn tick(&mut self, elapsed_ms: i32);

    fn receiver(&self) -> &dyn Any;

    fn method_names(&self) -> Vec<&'static str>;
}

/// Where the receiver lives.
trait Host<S>: Send + 'static {
    fn shared(&self) -> &S;
    fn exclusive(&mut self) -> Option<&mut S>;
}

struct Owned<S>(S);

impl<S: Send + 'static> Host<S> for Owned<S> {
    fn shared(&self) -> &S {
        &self.0
    }

    fn exclusive(&mut self) -> Option<&mut S> {
        Some(&mut self.0)
    }
}

struct Shared<S>(Arc<S>);

impl<S: Send + Sync + 'static> Host<S> for Shared<S> {
    fn shared(&self) -> &S {
        &self.0
    }

    fn exclusive(&mut self) -> Option<&mut S> {
        None
    }
}

struct Bound<S, H> {
    host: H,
    methods: HashMap<&'static str, MethodType<S>>,
    tick: Option<TickFn<S>>,
}

impl<S, H> ServiceObject for Bound<S, H>
where
    S: Service,
    H: Host<S>,
{
    fn invoke(
        &mut self,
        method: &str,
        key: &str,
        arg: Payload,
        reply: Option<&mut dyn Any>,
    ) -> Result<(), CallError> {
        let Some(mtype) = self.methods.get(method) else {
            return Err(CallError::MethodNotFound { key: key.to_string() });
        };
        match &mtype.invoke {
            Invoke::Shared(f) => f(self.host.shared(), key, arg, reply),
            Invoke::Exclusive(f) => match self.host.exclusive() {
                Some(rcvr) => f(rcvr, key, arg, reply),
                None => Err(CallError::invalid(key, "method needs an owned receiver")),
            },
        }
    }

    fn has_tick(&self) -> bool {
        self.tick.is_some()
    }

    fn tick(&mut self, elapsed_ms: i32) {
        if let (Some(tick), Some(rcvr)) = (&self.tick, self.host.exclusive()) {
            tick(rcvr, elapsed_ms);
        }
    }

    fn receiver(&self) -> &dyn Any {
        self.host.shared()
    }

    fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Registry of named services, dispatched by `"Service.Method"` keys.
///
/// Usually obtained through [`Executor::reflective`](crate::Executor::reflective)
/// so that registration events land on the executor's bus.
pub struct Registry {
    services: HashMap<String, Box<dyn ServiceObject>>,
    bus: Bus,
}

impl Registry {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            services: HashMap::new(),
            bus,
        }
    }

    /// Registers an owned receiver. Every declared method is reachable.
    ///
    /// # Errors
    /// - [`RegisterError::UnnamedService`] if `S` has no usable type name
    /// - [`RegisterError::DuplicateService`] if the name is taken
    /// - [`RegisterError::NoSuitableMethods`] if no method passed validation
    pub fn register<S: Service>(&mut self, service: S) -> Result<(), RegisterError> {
        self.install(Owned(service), Access::Exclusive)
    }

    /// Registers a shared receiver. Only `&self` methods are reachable.
    ///
    /// # Errors
    /// As [`register`](Self::register); `NoSuitableMethods` carries a hint
    /// when an owned registration would have succeeded.
    pub fn register_shared<S: Service + Sync>(&mut self, service: Arc<S>) -> Result<(), RegisterError> {
        self.install(Shared(service), Access::Shared)
    }

    fn install<S, H>(&mut self, host: H, access: Access) -> Result<(), RegisterError>
    where
        S: Service,
        H: Host<S>,
    {
        let name = service_name::<S>().inspect_err(|e| self.rejected(type_name::<S>(), e))?;
        if self.services.contains_key(name) {
            let err = RegisterError::DuplicateService { service: name.to_string() };
            self.rejected(name, &err);
            return Err(err);
        }

        let mut declared = Methods::<S>::new();
        S::methods(&mut declared);
        let (declared, mut tick) = declared.into_parts();

        let hint = access == Access::Shared
            && !any_suitable(&declared, Access::Shared)
            && any_suitable(&declared, Access::Exclusive);

        let bus = &self.bus;
        let methods = suitable_methods(declared, access, |method, reason| {
            bus.publish(skipped(name, method, reason));
        });
        if access == Access::Shared && tick.take().is_some() {
            bus.publish(skipped(name, TICK, "tick needs an owned receiver".to_string()));
        }

        if methods.is_empty() {
            let err = RegisterError::NoSuitableMethods { service: name.to_string(), hint };
            self.rejected(name, &err);
            return Err(err);
        }

        self.bus.publish(
            Event::new(EventKind::ServiceRegistered)
                .with_service(name)
                .with_count(methods.len()),
        );
        self.services.insert(
            name.to_string(),
            Box::new(Bound { host, methods, tick }),
        );
        Ok(())
    }

    fn rejected(&self, service: &str, err: &RegisterError) {
        self.bus.publish(
            Event::new(EventKind::RegistrationRejected)
                .with_service(service)
                .with_reason(err.to_string()),
        );
    }

    /// Returns the registered receiver of type `S`, if any.
    pub fn get<S: Service>(&self) -> Option<&S> {
        let name = service_name::<S>().ok()?;
        self.services.get(name)?.receiver().downcast_ref::<S>()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validated method names of a service, sorted.
    pub fn methods(&self, service: &str) -> Option<Vec<&'static str>> {
        self.services.get(service).map(|s| s.method_names())
    }

    fn lookup<'a>(
        &'a mut self,
        key: &'a str,
    ) -> Result<(&'a mut Box<dyn ServiceObject>, &'a str), CallError> {
        let Some((service, method)) = key.rsplit_once('.') else {
            return Err(CallError::MalformedKey { key: key.to_string() });
        };
        match self.services.get_mut(service) {
            Some(svc) => Ok((svc, method)),
            None => Err(CallError::ServiceNotFound { key: key.to_string() }),
        }
    }
}

impl Dispatch for Registry {
    fn call(&mut self, key: &str, arg: Payload, reply: &mut dyn Any) -> Result<(), CallError> {
        let (svc, method) = self.lookup(key)?;
        svc.invoke(method, key, arg, Some(reply))
    }

    fn post(&mut self, key: &str, arg: Payload) -> Result<(), CallError> {
        let (svc, method) = self.lookup(key)?;
        svc.invoke(method, key, arg, None)
    }

    fn has_tick(&self) -> bool {
        self.services.values().any(|s| s.has_tick())
    }

    fn tick(&mut self, elapsed_ms: i32) {
        for svc in self.services.values_mut() {
            svc.tick(elapsed_ms);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("services", &self.services())
            .finish()
    }
}

fn skipped(service: &str, method: &str, reason: String) -> Event {
    Event::new(EventKind::MethodSkipped)
        .with_service(service)
        .with_method(format!("{service}.{method}"))
        .with_reason(reason)
}

/// The last path segment of the type name, without generics.
pub(crate) fn service_name<S>() -> Result<&'static str, RegisterError> {
    let full = type_name::<S>();
    let base = full.split('<').next().unwrap_or(full);
    let name = base.rsplit("::").next().unwrap_or(base);
    if is_identifier(name) {
        Ok(name)
    } else {
        Err(RegisterError::UnnamedService { type_name: full })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Roster {
        names: Vec<String>,
        ticks: Vec<i32>,
    }

    impl Roster {
        fn add(&mut self, name: String) -> Result<(), String> {
            if self.names.contains(&name) {
                return Err(format!("{name} already listed"));
            }
            self.names.push(name);
            Ok(())
        }

        fn has(&self, name: String, reply: &mut bool) -> Result<(), String> {
            *reply = self.names.contains(&name);
            Ok(())
        }
    }

    impl Service for Roster {
        fn methods(m: &mut Methods<Self>) {
            m.post("Add", Roster::add)
                .call_ref("Has", Roster::has)
                .post("clear", |r: &mut Roster, _: ()| {
                    r.names.clear();
                    Ok::<(), String>(())
                })
                .tick(|r: &mut Roster, ms| r.ticks.push(ms));
        }
    }

    struct Vault;

    impl Service for Vault {
        fn methods(m: &mut Methods<Self>) {
            m.post("Lock", |_: &mut Vault, _: ()| Ok::<(), String>(()))
                .tick(|_: &mut Vault, _| {});
        }
    }

    struct Quiet;

    impl Service for Quiet {
        fn methods(m: &mut Methods<Self>) {
            m.post("hidden", |_: &mut Quiet, _: ()| Ok::<(), String>(()));
        }
    }

    impl Service for () {
        fn methods(m: &mut Methods<Self>) {
            m.post("Noop", |_: &mut (), _: ()| Ok::<(), String>(()));
        }
    }

    fn registry() -> (Registry, tokio::sync::broadcast::Receiver<Event>) {
        let bus = Bus::new(64);
        let rx = bus.subscribe();
        (Registry::new(bus), rx)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<(EventKind, String)> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            let target = ev.method.or(ev.service).unwrap_or_default();
            out.push((ev.kind, target.to_string()));
        }
        out
    }

    #[test]
    fn test_service_names() {
        assert_eq!(service_name::<Roster>(), Ok("Roster"));
        assert_eq!(service_name::<Vec<Roster>>(), Ok("Vec"));
        assert!(matches!(
            service_name::<()>(),
            Err(RegisterError::UnnamedService { type_name: "()" })
        ));
        assert!(service_name::<(u8, u8)>().is_err());
    }

    #[test]
    fn test_register_and_dispatch() {
        let (mut reg, mut rx) = registry();
        reg.register(Roster::default()).expect("register");

        assert_eq!(reg.services(), vec!["Roster"]);
        assert_eq!(reg.methods("Roster"), Some(vec!["Add", "Has"]));
        assert_eq!(
            drain(&mut rx),
            vec![
                (EventKind::MethodSkipped, "Roster.clear".to_string()),
                (EventKind::ServiceRegistered, "Roster".to_string()),
            ]
        );

        reg.post("Roster.Add", Box::new("ada".to_string())).expect("add");
        let mut has = false;
        reg.call("Roster.Has", Box::new("ada".to_string()), &mut has)
            .expect("has");
        assert!(has);

        let err = reg.post("Roster.Add", Box::new("ada".to_string())).unwrap_err();
        assert_eq!(err.to_string(), "ada already listed");

        assert!(reg.has_tick());
        reg.tick(10);
        assert_eq!(reg.get::<Roster>().map(|r| r.ticks.clone()), Some(vec![10]));
    }

    #[test]
    fn test_registration_events_carry_service_and_method() {
        let (mut reg, mut rx) = registry();
        reg.register(Roster::default()).expect("register");

        let skipped = rx.try_recv().expect("skipped");
        assert_eq!(skipped.kind, EventKind::MethodSkipped);
        assert_eq!(skipped.service.as_deref(), Some("Roster"));
        assert_eq!(skipped.method.as_deref(), Some("Roster.clear"));

        let registered = rx.try_recv().expect("registered");
        assert_eq!(registered.kind, EventKind::ServiceRegistered);
        assert_eq!(registered.service.as_deref(), Some("Roster"));
        assert_eq!(registered.method, None);
        assert_eq!(registered.count, Some(2));
    }

    #[test]
    fn test_lookup_errors() {
        let (mut reg, _rx) = registry();
        reg.register(Roster::default()).expect("register");

        let err = reg.post("NoDot", Box::new(())).unwrap_err();
        assert!(matches!(err, CallError::MalformedKey { .. }));

        let err = reg.post("Ghost.Foo", Box::new(())).unwrap_err();
        assert_eq!(err.to_string(), "can't find service Ghost.Foo");

        let err = reg.post("Roster.Bogus", Box::new(())).unwrap_err();
        assert_eq!(err.to_string(), "can't find method Roster.Bogus");

        let err = reg.post("Roster.clear", Box::new(())).unwrap_err();
        assert!(matches!(err, CallError::MethodNotFound { .. }));

        let err = reg.post("Roster.Add", Box::new(42_u32)).unwrap_err();
        assert!(matches!(err, CallError::InvalidArgument { .. }));
    }

    #[test]
    fn test_registration_rejections() {
        let (mut reg, mut rx) = registry();
        reg.register(Roster::default()).expect("register");
        drain(&mut rx);

        let err = reg.register(Roster::default()).unwrap_err();
        assert_eq!(err, RegisterError::DuplicateService { service: "Roster".into() });

        let err = reg.register(Quiet).unwrap_err();
        assert_eq!(
            err,
            RegisterError::NoSuitableMethods { service: "Quiet".into(), hint: false }
        );

        let err = reg.register_shared(Arc::new(Vault)).unwrap_err();
        assert_eq!(
            err,
            RegisterError::NoSuitableMethods { service: "Vault".into(), hint: true }
        );

        let err = reg.register(()).unwrap_err();
        assert_eq!(err.as_label(), "register_unnamed_service");

        let rejected = drain(&mut rx)
            .into_iter()
            .filter(|(kind, _)| *kind == EventKind::RegistrationRejected)
            .count();
        assert_eq!(rejected, 4);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_shared_receiver() {
        let (mut reg, mut rx) = registry();
        let roster = Arc::new(Roster {
            names: vec!["grace".into()],
            ticks: Vec::new(),
        });
        reg.register_shared(Arc::clone(&roster)).expect("register");

        let skipped: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|(kind, _)| *kind == EventKind::MethodSkipped)
            .map(|(_, m)| m)
            .collect();
        assert_eq!(skipped, vec!["Roster.Add", "Roster.clear", "Roster.Tick"]);

        let mut has = false;
        reg.call("Roster.Has", Box::new("grace".to_string()), &mut has)
            .expect("has");
        assert!(has);
        assert!(!reg.has_tick());
        assert!(std::ptr::eq(reg.get::<Roster>().expect("registered"), &*roster));
    }
}
