//! Time source abstraction
//!
//! Due dates and overdue classification depend on "now". Routing every
//! timestamp through a [`Clock`] keeps that decision deterministic under
//! test: production code uses [`SystemClock`], tests use [`ManualClock`] and
//! move time by hand.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// A source of the current wall-clock time
pub trait Clock: Send + Sync {
    /// The current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that only moves when told to
///
/// The mutex is strictly for the clock value; it is never held across any
/// engine call.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a manual clock starting at `start`
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    /// Jump the clock to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }

    /// Move the clock forward by `delta`
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
