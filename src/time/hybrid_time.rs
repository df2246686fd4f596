// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid time: physical microseconds packed with a logical counter.

use std::time::Duration;

use super::TimeError;

/// Number of low bits reserved for the logical component.
pub const LOGICAL_BITS: u32 = 12;

/// Mask selecting the logical component of a packed hybrid time.
pub const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// A hybrid logical timestamp.
///
/// The packed representation is `physical_micros << 12 | logical`, so the
/// natural `u64` order is the (physical, logical) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HybridTime(u64);

impl HybridTime {
    /// The smallest possible hybrid time.
    pub const MIN: HybridTime = HybridTime(0);

    /// The largest possible hybrid time.
    pub const MAX: HybridTime = HybridTime(u64::MAX);

    /// The first hybrid time handed out by a fresh clock.
    pub const INITIAL: HybridTime = HybridTime(1);

    /// Creates a hybrid time from its packed representation.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Creates a hybrid time with the given physical component and a zero logical component.
    ///
    /// Physical values too large for the packed layout saturate at [`HybridTime::MAX`].
    #[inline]
    pub fn from_micros(physical_micros: u64) -> Self {
        match physical_micros.checked_mul(1 << LOGICAL_BITS) {
            Some(raw) => Self(raw),
            None => Self::MAX,
        }
    }

    /// Creates a hybrid time from both components.
    pub fn from_micros_and_logical(physical_micros: u64, logical: u64) -> Result<Self, TimeError> {
        if logical > LOGICAL_MASK {
            return Err(TimeError::LogicalOverflow { logical });
        }
        if physical_micros > (u64::MAX >> LOGICAL_BITS) {
            return Err(TimeError::PhysicalOverflow { physical_micros });
        }
        Ok(Self((physical_micros << LOGICAL_BITS) | logical))
    }

    /// Returns the packed representation.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Returns the physical component in microseconds since the Unix epoch.
    #[inline]
    pub const fn physical_micros(self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    /// Returns the logical component.
    #[inline]
    pub const fn logical(self) -> u64 {
        self.0 & LOGICAL_MASK
    }

    /// Returns the next hybrid time in the total order, saturating at `MAX`.
    #[inline]
    pub fn incremented(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the previous hybrid time in the total order, saturating at `MIN`.
    #[inline]
    pub fn decremented(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Returns true for the `MIN` sentinel.
    #[inline]
    pub fn is_min(self) -> bool {
        self == Self::MIN
    }

    /// Returns true for the `MAX` sentinel.
    #[inline]
    pub fn is_max(self) -> bool {
        self == Self::MAX
    }
}

/// Adds wall-clock time to the physical component of a hybrid time.
///
/// The logical component is preserved. Sub-microsecond precision is dropped
/// and the result saturates at [`HybridTime::MAX`]; `MAX` stays `MAX`.
pub fn add_physical_time_to_hybrid_time(ht: HybridTime, duration: Duration) -> HybridTime {
    if ht.is_max() {
        return ht;
    }
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    let physical = ht.physical_micros().saturating_add(micros);
    if physical > (u64::MAX >> LOGICAL_BITS) {
        return HybridTime::MAX;
    }
    HybridTime((physical << LOGICAL_BITS) | ht.logical())
}

impl std::fmt::Display for HybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::MIN => write!(f, "HT<min>"),
            Self::MAX => write!(f, "HT<max>"),
            ht if ht.logical() == 0 => write!(f, "HT{{ physical: {} }}", ht.physical_micros()),
            ht => write!(
                f,
                "HT{{ physical: {} logical: {} }}",
                ht.physical_micros(),
                ht.logical()
            ),
        }
    }
}
