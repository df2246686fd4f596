// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction identity and status resolution for intent-aware reads.
//!
//! Uncommitted writes of a distributed transaction are stored as intents.
//! A reader decides whether another transaction's intent is visible by
//! asking a [`TransactionStatusManager`] for that transaction's status:
//!
//! - `Pending` or `Aborted`: the intent is skipped
//! - `Committed(t)`: the intent reads as a committed write at `t`
//!
//! # Example
//!
//! ```
//! use docdb::time::HybridTime;
//! use docdb::txn::{
//!     LocalTransactionStatusManager, TransactionId, TransactionStatus, TransactionStatusManager,
//! };
//!
//! let manager = LocalTransactionStatusManager::new();
//! let id = TransactionId::generate();
//! manager.register(id).unwrap();
//! manager.commit(id, HybridTime::from_micros(100)).unwrap();
//! assert_eq!(
//!     manager.status(&id).unwrap(),
//!     TransactionStatus::Committed(HybridTime::from_micros(100))
//! );
//! ```

mod status;
mod transaction;

pub use status::LocalTransactionStatusManager;
pub use transaction::{
    TransactionId, TransactionOperationContext, TransactionStatus, TRANSACTION_ID_SIZE,
};

use crate::docdb::Result;

/// Resolves the status of a transaction by id.
pub trait TransactionStatusManager: Send + Sync {
    /// Returns the status of `id`, or `NotFound` if the transaction is unknown.
    fn status(&self, id: &TransactionId) -> Result<TransactionStatus>;
}
