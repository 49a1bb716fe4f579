//! # Executor options.
//!
//! Provides [`Options`], the settings read once when an executor is built.
//!
//! ## Sentinel values
//! - `mailbox_capacity = 0` → [`DEFAULT_MAILBOX_CAPACITY`]
//! - `call_timeout_ms = 0` → [`DEFAULT_CALL_TIMEOUT_MS`]; negative → no timeout
//! - `tick_interval_ms = 0` → [`DEFAULT_TICK_INTERVAL_MS`]
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Default number of envelopes the mailbox buffers before producers wait.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;
/// Default service-time budget of a call, in milliseconds.
pub const DEFAULT_CALL_TIMEOUT_MS: i64 = 1000;
/// Value of `call_timeout_ms` that disables the timeout.
pub const NO_CALL_TIMEOUT: i64 = -1;
/// Default tick period, in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// Settings for one executor.
///
/// ## Field semantics
/// - `mailbox_capacity`: bounded queue size (`0` = default)
/// - `call_timeout_ms`: service time allowed per call (`0` = default, `< 0` = none)
/// - `tick_interval_ms`: period of the tick hook (`0` = default)
/// - `bus_capacity`: diagnostic event ring buffer size (min 1)
///
/// All fields are public; prefer the accessors, which resolve the sentinels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Capacity of the mailbox.
    ///
    /// Producers wait once this many envelopes are queued.
    pub mailbox_capacity: usize,

    /// Call timeout in milliseconds.
    ///
    /// The timer starts when the executor begins servicing the call, so time
    /// spent waiting in the mailbox never counts.
    pub call_timeout_ms: i64,

    /// Tick interval in milliseconds.
    ///
    /// Only used when the dispatch backend has a tick hook.
    pub tick_interval_ms: u64,

    /// Capacity of the diagnostic event bus.
    pub bus_capacity: usize,
}

impl Options {
    /// Sets the mailbox capacity.
    #[must_use]
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Sets the call timeout in milliseconds (`0` = default, negative = none).
    #[must_use]
    pub fn with_call_timeout(mut self, millis: i64) -> Self {
        self.call_timeout_ms = millis;
        self
    }

    /// Disables the call timeout.
    #[must_use]
    pub fn without_call_timeout(mut self) -> Self {
        self.call_timeout_ms = NO_CALL_TIMEOUT;
        self
    }

    /// Sets the tick interval in milliseconds.
    #[must_use]
    pub fn with_tick_interval(mut self, millis: u64) -> Self {
        self.tick_interval_ms = millis;
        self
    }

    /// Sets the diagnostic bus capacity.
    #[must_use]
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Returns the mailbox capacity with the default filled in.
    #[inline]
    pub fn capacity(&self) -> usize {
        if self.mailbox_capacity == 0 {
            DEFAULT_MAILBOX_CAPACITY
        } else {
            self.mailbox_capacity
        }
    }

    /// Returns the call timeout as an `Option`.
    ///
    /// - `None` → calls wait for their result indefinitely
    /// - `Some(d)` → service time is bounded by `d`
    #[inline]
    pub fn call_timeout(&self) -> Option<Duration> {
        match self.call_timeout_ms {
            0 => Some(Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS as u64)),
            ms if ms < 0 => None,
            ms => Some(Duration::from_millis(ms as u64)),
        }
    }

    /// Returns the tick interval with the default filled in.
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        match self.tick_interval_ms {
            0 => Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a copy with every sentinel replaced by its effective value.
    pub fn resolved(&self) -> Self {
        Self {
            mailbox_capacity: self.capacity(),
            call_timeout_ms: match self.call_timeout() {
                Some(d) => d.as_millis().min(i64::MAX as u128) as i64,
                None => NO_CALL_TIMEOUT,
            },
            tick_interval_ms: self.tick_interval().as_millis().min(u64::MAX as u128) as u64,
            bus_capacity: self.bus_capacity_clamped(),
        }
    }
}

impl Default for Options {
    /// Default options:
    ///
    /// - `mailbox_capacity = 100`
    /// - `call_timeout_ms = 1000`
    /// - `tick_interval_ms = 10`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_selects_defaults() {
        let opts = Options {
            mailbox_capacity: 0,
            call_timeout_ms: 0,
            tick_interval_ms: 0,
            bus_capacity: 0,
        };
        assert_eq!(opts.capacity(), 100);
        assert_eq!(opts.call_timeout(), Some(Duration::from_millis(1000)));
        assert_eq!(opts.tick_interval(), Duration::from_millis(10));
        assert_eq!(opts.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_negative_timeout_disables() {
        let opts = Options::default().without_call_timeout();
        assert_eq!(opts.call_timeout(), None);

        let opts = Options::default().with_call_timeout(-25);
        assert_eq!(opts.call_timeout(), None);
    }

    #[test]
    fn test_resolved_keeps_explicit_values() {
        let opts = Options::default()
            .with_mailbox_capacity(7)
            .with_call_timeout(50)
            .with_tick_interval(0)
            .resolved();

        assert_eq!(opts.mailbox_capacity, 7);
        assert_eq!(opts.call_timeout_ms, 50);
        assert_eq!(opts.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(opts.resolved(), opts);
    }
}
