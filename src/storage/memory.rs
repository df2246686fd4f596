// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory ordered engine.
//!
//! Copy-on-write `BTreeMap` behind a lock: iterators hold an `Arc` of the map
//! as it was when they were created, so they see a fixed snapshot while
//! writers keep going.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::docdb::Result;

use super::{KvEngine, KvIterator, KvWriteBatch, ReadOptions, WriteOp};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// An ordered key-value engine held entirely in memory.
#[derive(Default)]
pub struct MemEngine {
    tree: RwLock<Arc<Tree>>,
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    fn snapshot(&self) -> Arc<Tree> {
        Arc::clone(&self.tree.read())
    }
}

impl KvEngine for MemEngine {
    type Cursor<'a> = MemCursor;

    fn raw_iterator(&self, _options: &ReadOptions) -> MemCursor {
        MemCursor::new(self.snapshot())
    }

    fn write(&self, batch: KvWriteBatch) -> Result<()> {
        let mut guard = self.tree.write();
        let tree = Arc::make_mut(&mut guard);
        for op in batch {
            match op {
                WriteOp::Put { key, value } => {
                    tree.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    tree.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Cursor over a [`MemEngine`] snapshot.
pub struct MemCursor {
    snapshot: Arc<Tree>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl MemCursor {
    fn new(snapshot: Arc<Tree>) -> Self {
        Self {
            snapshot,
            current: None,
        }
    }

    fn position(&mut self, lower: Bound<&[u8]>) {
        self.current = self
            .snapshot
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
    }
}

impl KvIterator for MemCursor {
    fn seek_to_first(&mut self) -> Result<()> {
        self.position(Bound::Unbounded);
        Ok(())
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.position(Bound::Included(key));
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if let Some((key, _)) = self.current.take() {
            self.position(Bound::Excluded(key.as_slice()));
        }
        Ok(())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map_or(&[][..], |(k, _)| k.as_slice())
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map_or(&[][..], |(_, v)| v.as_slice())
    }
}
