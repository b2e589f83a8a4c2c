//! Virtual clock for discrete-event simulation.
//!
//! The [`SimClock`] tracks simulated time independently of wall-clock time,
//! advancing only when events are processed. Time is a continuous quantity
//! in normalized units: a mean holding time of 1.0 makes one unit equal to
//! the average service lifetime.

use serde::{Deserialize, Serialize};

/// Virtual simulation clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    now: f64,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Current simulated time.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advance the clock to `time`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `time` is in the past.
    pub fn advance_to(&mut self, time: f64) {
        debug_assert!(
            time >= self.now,
            "Cannot move clock backwards: current={}, target={}",
            self.now,
            time,
        );
        self.now = time;
    }
}
