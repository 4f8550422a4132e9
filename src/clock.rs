//! # Injectable wall-clock source.
//!
//! Provides [`Clock`], the time dependency of the scheduler. The runtime never
//! reads ambient global time directly; every component that needs "now" asks the
//! clock it was constructed with. This keeps the recurrence math deterministic
//! under test.
//!
//! ## Rules
//! - "Now" is sampled **once per calculation pass** and reused for all comparisons
//!   in that pass (no wall-clock drift inside one computation).
//! - [`SystemClock`] is the production implementation.
//! - [`FixedClock`] returns a pinned, settable instant for deterministic tests.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
///
/// Substitutable for deterministic testing of recurrence math and timers.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant; the instant can be moved explicitly.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use chronovisor::{Clock, FixedClock};
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap());
/// assert_eq!(clock.now().to_rfc3339(), "2024-01-20T10:00:00+00:00");
/// ```
#[derive(Debug)]
pub struct FixedClock {
    at: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock pinned to `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: RwLock::new(at) }
    }

    /// Moves the clock to a new instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.at.write().expect("fixed clock poisoned") = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.read().expect("fixed clock poisoned")
    }
}
