#![forbid(unsafe_code)]

//! One-shot deferred callbacks driven by host ticks.
//!
//! A [`Deferred`] holds at most one pending payload together with the instant
//! at which it becomes due. Nothing runs on its own: the owner calls
//! [`Deferred::poll`] from its tick handler and acts on the returned payload.
//! Scheduling again replaces the pending payload, and [`Deferred::cancel`]
//! withdraws it.
//!
//! # Invariants
//! 1. At most one payload is pending.
//! 2. `poll` yields a payload exactly once, and only when `now >= due`.
//! 3. Time is always supplied by the caller; no clock is read here.
//!
//! # Example
//!
//! ```
//! use arbor_core::deferred::Deferred;
//! use std::time::{Duration, Instant};
//!
//! let mut timer = Deferred::new(Duration::from_millis(500));
//! let t0 = Instant::now();
//! timer.schedule("row 3", t0);
//!
//! assert_eq!(timer.poll(t0 + Duration::from_millis(100)), None);
//! assert_eq!(timer.poll(t0 + Duration::from_millis(500)), Some("row 3"));
//! assert!(!timer.is_pending());
//! ```

use std::time::{Duration, Instant};

/// A cancellable one-shot deadline carrying a payload.
#[derive(Debug, Clone)]
pub struct Deferred<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Deferred<T> {
    /// Create an idle timer that schedules payloads `delay` into the future.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// The configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the delay used by future `schedule` calls.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Schedule `payload` to become due at `now + delay`.
    ///
    /// Returns the payload that was pending before, if any.
    pub fn schedule(&mut self, payload: T, now: Instant) -> Option<T> {
        let due = now + self.delay;
        self.pending.replace((payload, due)).map(|(p, _)| p)
    }

    /// Withdraw the pending payload without firing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(p, _)| p)
    }

    /// Fire the pending payload if it is due.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(p, _)| p),
            _ => None,
        }
    }

    /// Whether a payload is waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        self.pending.as_ref().map(|(p, _)| p)
    }

    /// Time left until the pending payload is due.
    ///
    /// Returns `None` when nothing is pending and `Duration::ZERO` when overdue.
    #[must_use]
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, due)| due.saturating_duration_since(now))
    }
}
