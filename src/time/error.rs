// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Error types for hybrid time construction.

/// Errors that can occur when building hybrid times and their encodings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("logical component {logical} does not fit in the logical bits")]
    LogicalOverflow { logical: u64 },

    #[error("physical component {physical_micros} does not fit in the physical bits")]
    PhysicalOverflow { physical_micros: u64 },

    #[error("write id {write_id} exceeds the maximum {max}")]
    WriteIdOverflow { write_id: u32, max: u32 },
}
