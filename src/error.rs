//! Error types used by the executor and its dispatch backends.
//!
//! This module defines two main error enums:
//!
//! - [`RegisterError`] — raised synchronously while registering a service.
//! - [`CallError`] — raised while dispatching a call (or reported for posts).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logs/metrics.

use thiserror::Error;

/// Error returned by a handler or service method.
///
/// The executor never inspects it; it reaches the caller unchanged through
/// [`CallError::Handler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced while registering a service.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// The concrete type has no usable name (tuples, closures, ...).
    #[error("no service name for type {type_name}")]
    UnnamedService {
        /// Full type name as reported by the compiler.
        type_name: &'static str,
    },

    /// A service with the same name is already registered.
    #[error("service already defined: {service}")]
    DuplicateService {
        /// Name of the conflicting service.
        service: String,
    },

    /// The service exposes no method that passed validation.
    #[error("type {service} has no exported methods of suitable type{}", hint_suffix(.hint))]
    NoSuitableMethods {
        /// Name of the rejected service.
        service: String,
        /// `true` when registering an owned value would have produced methods.
        hint: bool,
    },
}

fn hint_suffix(hint: &bool) -> &'static str {
    if *hint {
        " (hint: register an owned value to reach methods taking &mut self)"
    } else {
        ""
    }
}

impl RegisterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use mailroom::RegisterError;
    ///
    /// let err = RegisterError::DuplicateService { service: "Roster".into() };
    /// assert_eq!(err.as_label(), "register_duplicate_service");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RegisterError::UnnamedService { .. } => "register_unnamed_service",
            RegisterError::DuplicateService { .. } => "register_duplicate_service",
            RegisterError::NoSuitableMethods { .. } => "register_no_suitable_methods",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RegisterError::UnnamedService { type_name } => format!("unnamed: {type_name}"),
            RegisterError::DuplicateService { service } => format!("duplicate: {service}"),
            RegisterError::NoSuitableMethods { service, hint } => {
                format!("no suitable methods: {service} hint={hint}")
            }
        }
    }
}

/// # Errors produced while dispatching a call.
///
/// Lookup failures (`MalformedKey`, `ServiceNotFound`, `MethodNotFound`) and
/// argument problems are raised by the dispatch backend; `Timeout` and
/// `Closed` by the executor; `Handler` carries whatever the invoked method
/// returned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CallError {
    /// The key has no `.` separating service and method.
    #[error("service/method request ill-formed: {key}")]
    MalformedKey {
        /// The offending key.
        key: String,
    },

    /// No service is registered under the key's service part.
    #[error("can't find service {key}")]
    ServiceNotFound {
        /// The full key that was looked up.
        key: String,
    },

    /// The service (or handler table) has no such method.
    #[error("can't find method {key}")]
    MethodNotFound {
        /// The full key that was looked up.
        key: String,
    },

    /// Service time of the call exceeded the configured timeout.
    #[error("call method ({method}) timeout")]
    Timeout {
        /// Method key of the timed out call.
        method: String,
    },

    /// The argument or reply slot does not match what the method expects.
    #[error("invalid argument for {method}: {reason}")]
    InvalidArgument {
        /// Method key.
        method: String,
        /// What did not match.
        reason: String,
    },

    /// The executor shut down before servicing the call.
    #[error("executor closed before servicing {method}")]
    Closed {
        /// Method key of the abandoned call.
        method: String,
    },

    /// Error returned by the method itself.
    #[error(transparent)]
    Handler(HandlerError),
}

impl CallError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use mailroom::CallError;
    ///
    /// let err = CallError::Timeout { method: "Roster.Add".into() };
    /// assert_eq!(err.as_label(), "call_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CallError::MalformedKey { .. } => "call_malformed_key",
            CallError::ServiceNotFound { .. } => "call_service_not_found",
            CallError::MethodNotFound { .. } => "call_method_not_found",
            CallError::Timeout { .. } => "call_timeout",
            CallError::InvalidArgument { .. } => "call_invalid_argument",
            CallError::Closed { .. } => "call_closed",
            CallError::Handler(_) => "call_handler_error",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            CallError::MalformedKey { key } => format!("malformed key: {key}"),
            CallError::ServiceNotFound { key } => format!("service not found: {key}"),
            CallError::MethodNotFound { key } => format!("method not found: {key}"),
            CallError::Timeout { method } => format!("timeout: {method}"),
            CallError::InvalidArgument { method, reason } => format!("{method}: {reason}"),
            CallError::Closed { method } => format!("closed: {method}"),
            CallError::Handler(e) => format!("handler: {e}"),
        }
    }

    /// Returns the handler's own error, if this is one.
    pub fn into_handler_error(self) -> Option<HandlerError> {
        match self {
            CallError::Handler(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn invalid(method: &str, reason: impl Into<String>) -> Self {
        CallError::InvalidArgument {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_key() {
        let err = CallError::ServiceNotFound { key: "Ghost.Foo".into() };
        assert_eq!(err.to_string(), "can't find service Ghost.Foo");

        let err = CallError::Timeout { method: "Roster.Add".into() };
        assert_eq!(err.to_string(), "call method (Roster.Add) timeout");
    }

    #[test]
    fn test_handler_error_is_transparent() {
        let err = CallError::Handler("roster is full".into());
        assert_eq!(err.to_string(), "roster is full");
        assert_eq!(err.as_label(), "call_handler_error");

        let inner = err.into_handler_error().expect("handler error");
        assert_eq!(inner.to_string(), "roster is full");
    }

    #[test]
    fn test_no_suitable_methods_hint() {
        let plain = RegisterError::NoSuitableMethods { service: "Roster".into(), hint: false };
        assert!(!plain.to_string().contains("hint"));

        let hinted = RegisterError::NoSuitableMethods { service: "Roster".into(), hint: true };
        assert!(hinted.to_string().contains("hint: register an owned value"));
    }
}
