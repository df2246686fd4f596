// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! DocDB error types.

use crate::time::{HybridTime, TimeError};

/// Errors that can occur while encoding, decoding, seeking and writing documents.
#[derive(Debug, thiserror::Error)]
pub enum DocDbError {
    /// Malformed or truncated key, timestamp or value bytes.
    #[error("corruption: {0}")]
    Corruption(String),

    /// A lookup whose contract is "must exist" found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A seek key carried a timestamp that is neither `MAX_WRITE_ID`-suffixed nor the minimum.
    #[error("seek key {key} carries non-canonical hybrid time {hybrid_time}")]
    InvalidSeekKey { key: String, hybrid_time: String },

    #[error("transaction {0} is not pending")]
    TransactionNotPending(String),

    #[error("invalid hybrid time {ht}: {reason}")]
    InvalidHybridTime { ht: HybridTime, reason: &'static str },

    #[error("time error: {0}")]
    Time(#[from] TimeError),

    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocDbError {
    /// Returns true for [`DocDbError::Corruption`].
    pub fn is_corruption(&self) -> bool {
        matches!(self, DocDbError::Corruption(_))
    }

    /// Returns true for [`DocDbError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocDbError::NotFound(_))
    }
}

/// Result alias used throughout the DocDB layer.
pub type Result<T> = std::result::Result<T, DocDbError>;
