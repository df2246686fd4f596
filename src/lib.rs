// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! DocDB: hierarchical documents with time-travel reads over an ordered key-value store
//!
//! This crate provides the document key encoding, the hybrid-time seek engine
//! and the transaction-intent overlay that a document database tablet builds on.

pub mod docdb;
pub mod storage;
pub mod time;
pub mod txn;

pub use docdb::{
    DocDb, DocDbConfig, DocDbError, DocHybridTime, DocKey, DocPath, DocWriteBatch,
    InitMarkerBehavior, IntentAwareIterator, ListExtendOrder, PrimitiveValue, Result, SeekConfig,
    SubDocKey, SubDocument, Value,
};
pub use storage::{KvEngine, KvIterator, MemEngine, ReadOptions, RocksEngine};
pub use time::{Clock, HybridClock, HybridTime, ManualClock, TimeError};
pub use txn::{
    LocalTransactionStatusManager, TransactionId, TransactionOperationContext, TransactionStatus,
    TransactionStatusManager,
};
