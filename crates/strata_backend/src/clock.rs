// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time abstraction for expiration checks and recency bookkeeping.
//!
//! Working with time is notoriously difficult to test. The [`Clock`] lets
//! production code read real wall-clock time while tests freeze time and
//! advance it manually, making expiration tests fast and deterministic.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Provides the current time as `f64` seconds since the Unix epoch.
///
/// Cloning a clock is inexpensive (an `Arc` clone) and every clone shares the
/// same underlying state: advancing a frozen clock through one clone is
/// visible to every other clone.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use strata_backend::Clock;
///
/// let clock = Clock::new_frozen();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(60));
/// assert_eq!(clock.now(), before + 60.0);
/// ```
#[derive(Debug, Clone)]
pub struct Clock(Arc<ClockState>);

#[derive(Debug)]
enum ClockState {
    System,
    Frozen(Mutex<f64>),
}

impl Clock {
    /// Creates a clock backed by the system wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(ClockState::System))
    }

    /// Creates a frozen clock that only moves when [`advance`](Self::advance)
    /// is called.
    ///
    /// The frozen clock starts at the current system time so that encoded
    /// absolute expirations remain plausible.
    #[must_use]
    pub fn new_frozen() -> Self {
        Self::new_frozen_at(system_now())
    }

    /// Creates a frozen clock starting at the given epoch-seconds instant.
    #[must_use]
    pub fn new_frozen_at(epoch_seconds: f64) -> Self {
        Self(Arc::new(ClockState::Frozen(Mutex::new(epoch_seconds))))
    }

    /// Returns the current time in seconds since the Unix epoch.
    #[must_use]
    pub fn now(&self) -> f64 {
        match self.0.as_ref() {
            ClockState::System => system_now(),
            ClockState::Frozen(time) => *time.lock(),
        }
    }

    /// Advances a frozen clock by the given duration.
    ///
    /// # Panics
    ///
    /// Panics when called on a system clock; real time cannot be advanced.
    pub fn advance(&self, duration: Duration) {
        match self.0.as_ref() {
            ClockState::System => panic!("cannot advance a system clock"),
            ClockState::Frozen(time) => *time.lock() += duration.as_secs_f64(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

fn system_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}
