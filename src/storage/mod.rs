// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Ordered key-value engine boundary.
//!
//! The document layer only needs a forward cursor over a sorted byte
//! keyspace and an atomic batch write. This module defines that boundary
//! ([`KvIterator`], [`KvEngine`]) and provides two engines behind it:
//!
//! - [`MemEngine`]: a copy-on-write `BTreeMap`, used by tests and benchmarks
//! - [`RocksEngine`]: RocksDB with the tuning described by
//!   [`RocksDbConfig`](crate::docdb::RocksDbConfig)
//!
//! # Example
//!
//! ```
//! use docdb::storage::{KvEngine, KvIterator, KvWriteBatch, MemEngine, ReadOptions};
//!
//! let engine = MemEngine::new();
//! let mut batch = KvWriteBatch::new();
//! batch.put(b"a".to_vec(), b"1".to_vec());
//! engine.write(batch).unwrap();
//!
//! let mut iter = engine.iterator(&ReadOptions::new());
//! iter.seek_to_first().unwrap();
//! assert_eq!(iter.key(), b"a");
//! ```

mod batch;
mod iterator;
mod memory;
mod options;
mod rocks;

pub use batch::{KvWriteBatch, WriteOp};
pub use iterator::{FilteredIterator, KvIterator};
pub use memory::{MemCursor, MemEngine};
pub use options::{
    prefix_successor, BloomFilterMode, KeyFilter, QueryId, ReadOptions, DEFAULT_QUERY_ID,
};
pub use rocks::{RocksCursor, RocksEngine};

use crate::docdb::Result;

/// An ordered key-value engine.
///
/// Implementations must be safe to share between threads. Each cursor reads
/// a consistent view of the keyspace as of its creation.
pub trait KvEngine: Send + Sync {
    /// The engine's native cursor type.
    type Cursor<'a>: KvIterator
    where
        Self: 'a;

    /// Creates a cursor honoring only the engine-level parts of `options`
    /// (prefix bounds where the engine supports them).
    fn raw_iterator(&self, options: &ReadOptions) -> Self::Cursor<'_>;

    /// Creates a cursor that also applies the key filter and prefix restriction.
    fn iterator(&self, options: &ReadOptions) -> FilteredIterator<Self::Cursor<'_>> {
        FilteredIterator::new(self.raw_iterator(options), options)
    }

    /// Applies `batch` atomically.
    fn write(&self, batch: KvWriteBatch) -> Result<()>;

    /// Persists buffered writes.
    fn flush(&self) -> Result<()>;
}
