//! Wall Clock Abstraction
//!
//! Iteration timestamps come from a [`Clock`] so measurements can be made
//! reproducible in tests.

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::Mutex;

/// Source of wall-clock timestamps
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> DateTime<Local>;
}

/// The system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Deterministic clock: every reading advances time by a fixed step
///
/// The first reading returns the start time itself.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Local>>,
    step: TimeDelta,
}

impl SteppingClock {
    /// Create a clock starting at `start` advancing by `step` per reading
    #[must_use]
    pub fn new(start: DateTime<Local>, step: TimeDelta) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Local> {
        let mut next = self.next.lock();
        let current = *next;
        *next = current + self.step;
        current
    }
}
