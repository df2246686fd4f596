// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid Logical Clock (HLC) implementation.
//!
//! HLC combines physical time with a logical counter to provide monotonic timestamps
//! even when physical clocks are imperfect. The logical counter lives in the low
//! bits of the packed [`HybridTime`], so advancing it is a plain increment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{Clock, HybridTime};

/// Hybrid Logical Clock.
///
/// Guarantees that each call to `now()` returns a hybrid time greater than all previous
/// calls, even under concurrent access.
pub struct HybridClock {
    last: AtomicU64,
    max_clock_skew: Duration,
}

impl HybridClock {
    /// Creates a new clock with the given maximum skew assumption.
    pub fn new(max_clock_skew: Duration) -> Self {
        Self {
            last: AtomicU64::new(HybridTime::MIN.to_raw()),
            max_clock_skew,
        }
    }

    fn physical_time_micros() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

impl Default for HybridClock {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Clock for HybridClock {
    fn now(&self) -> HybridTime {
        loop {
            let physical = HybridTime::from_micros(Self::physical_time_micros()).to_raw();
            let last = self.last.load(Ordering::Acquire);
            let next = physical.max(last.saturating_add(1));

            match self
                .last
                .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return HybridTime::from_raw(next),
                Err(_) => continue,
            }
        }
    }

    fn update(&self, observed: HybridTime) {
        self.last.fetch_max(observed.to_raw(), Ordering::AcqRel);
    }

    #[inline]
    fn max_clock_skew(&self) -> Duration {
        self.max_clock_skew
    }
}

/// A clock whose physical time only moves when told to.
///
/// Used by tests that need exact, reproducible hybrid times.
pub struct ManualClock {
    physical_micros: AtomicU64,
    last: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `physical_micros`.
    pub fn new(physical_micros: u64) -> Self {
        Self {
            physical_micros: AtomicU64::new(physical_micros),
            last: AtomicU64::new(HybridTime::MIN.to_raw()),
        }
    }

    /// Sets the physical time; moving backwards only stalls `now()` on the logical counter.
    pub fn set_micros(&self, physical_micros: u64) {
        self.physical_micros.store(physical_micros, Ordering::Release);
    }

    /// Advances the physical time.
    pub fn advance(&self, by: Duration) {
        self.physical_micros
            .fetch_add(by.as_micros() as u64, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HybridTime {
        loop {
            let physical =
                HybridTime::from_micros(self.physical_micros.load(Ordering::Acquire)).to_raw();
            let last = self.last.load(Ordering::Acquire);
            let next = if physical > last {
                physical
            } else {
                last.saturating_add(1)
            };
            if self
                .last
                .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return HybridTime::from_raw(next);
            }
        }
    }

    fn update(&self, observed: HybridTime) {
        self.last.fetch_max(observed.to_raw(), Ordering::AcqRel);
    }

    fn max_clock_skew(&self) -> Duration {
        Duration::ZERO
    }
}
