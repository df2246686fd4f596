// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Clock trait definition.

use std::time::Duration;

use super::HybridTime;

/// The hybrid clock interface consumed by the read and write paths.
///
/// Every hybrid time assigned to a write batch or used as a read point
/// flows through this interface.
pub trait Clock: Send + Sync {
    /// Returns a hybrid time strictly greater than any previously returned one.
    fn now(&self) -> HybridTime;

    /// Ratchets the clock forward so that later `now()` calls exceed `observed`.
    fn update(&self, observed: HybridTime);

    /// Returns the assumed maximum skew between nodes.
    fn max_clock_skew(&self) -> Duration;
}
