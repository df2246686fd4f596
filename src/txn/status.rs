// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory transaction status table.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::docdb::{DocDbError, Result};
use crate::time::HybridTime;

use super::{TransactionId, TransactionStatus, TransactionStatusManager};

/// Status table for transactions coordinated by this process.
///
/// Transitions are one-way: `Pending` to `Committed` or `Aborted`.
#[derive(Default)]
pub struct LocalTransactionStatusManager {
    statuses: RwLock<HashMap<TransactionId, TransactionStatus>>,
}

impl LocalTransactionStatusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a new pending transaction.
    pub fn register(&self, id: TransactionId) -> Result<()> {
        let mut statuses = self.statuses.write();
        if statuses.contains_key(&id) {
            return Err(DocDbError::InvalidArgument(format!(
                "transaction {id} is already registered"
            )));
        }
        statuses.insert(id, TransactionStatus::Pending);
        debug!(txn = %id, "registered transaction");
        Ok(())
    }

    pub fn commit(&self, id: TransactionId, commit_ht: HybridTime) -> Result<()> {
        self.transition(id, TransactionStatus::Committed(commit_ht))
    }

    pub fn abort(&self, id: TransactionId) -> Result<()> {
        self.transition(id, TransactionStatus::Aborted)
    }

    /// Number of tracked transactions.
    pub fn len(&self) -> usize {
        self.statuses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.read().is_empty()
    }

    fn transition(&self, id: TransactionId, to: TransactionStatus) -> Result<()> {
        let mut statuses = self.statuses.write();
        match statuses.get_mut(&id) {
            None => Err(DocDbError::NotFound(format!("transaction {id}"))),
            Some(status @ TransactionStatus::Pending) => {
                *status = to;
                debug!(txn = %id, status = ?to, "transaction status changed");
                Ok(())
            }
            Some(_) => Err(DocDbError::TransactionNotPending(id.to_string())),
        }
    }
}

impl TransactionStatusManager for LocalTransactionStatusManager {
    fn status(&self, id: &TransactionId) -> Result<TransactionStatus> {
        self.statuses
            .read()
            .get(id)
            .copied()
            .ok_or_else(|| DocDbError::NotFound(format!("transaction {id}")))
    }
}
