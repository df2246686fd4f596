// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction identity and status types.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::docdb::{DocDbError, Result};
use crate::time::HybridTime;

use super::TransactionStatusManager;

/// Size of an encoded transaction id.
pub const TRANSACTION_ID_SIZE: usize = 16;

/// Unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generates a random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; TRANSACTION_ID_SIZE]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parses an id from exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|e| DocDbError::Corruption(format!("invalid transaction id: {e}")))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; TRANSACTION_ID_SIZE] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction status as seen by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Committed(HybridTime),
    Aborted,
}

impl TransactionStatus {
    /// Returns the commit time if committed.
    #[inline]
    pub fn commit_ht(&self) -> Option<HybridTime> {
        match self {
            TransactionStatus::Committed(ht) => Some(*ht),
            _ => None,
        }
    }
}

/// The transaction a read or write runs in, plus where to resolve other transactions.
#[derive(Clone)]
pub struct TransactionOperationContext {
    pub transaction_id: TransactionId,
    pub status_manager: Arc<dyn TransactionStatusManager>,
}

impl TransactionOperationContext {
    pub fn new(
        transaction_id: TransactionId,
        status_manager: Arc<dyn TransactionStatusManager>,
    ) -> Self {
        Self {
            transaction_id,
            status_manager,
        }
    }
}

impl fmt::Debug for TransactionOperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionOperationContext")
            .field("transaction_id", &self.transaction_id)
            .finish_non_exhaustive()
    }
}
