// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid time and the clock service.
//!
//! Every stored version and every read point is a [`HybridTime`]: physical
//! microseconds with a 12-bit logical counter packed below them. The
//! [`Clock`] trait hands out strictly increasing hybrid times; TTL expiry is
//! computed with [`add_physical_time_to_hybrid_time`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use docdb::time::{add_physical_time_to_hybrid_time, Clock, HybridClock, HybridTime};
//!
//! let clock = HybridClock::default();
//! let now = clock.now();
//! let expiry = add_physical_time_to_hybrid_time(now, Duration::from_secs(60));
//! assert!(expiry > now);
//! assert!(HybridTime::MIN < now);
//! ```

mod error;
mod hlc;
mod hybrid_time;
mod traits;

pub use error::TimeError;
pub use hlc::{HybridClock, ManualClock};
pub use hybrid_time::{add_physical_time_to_hybrid_time, HybridTime, LOGICAL_BITS, LOGICAL_MASK};
pub use traits::Clock;
