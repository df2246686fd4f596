// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The ordered-iterator abstraction consumed by the seek engine.

use std::sync::Arc;

use crate::docdb::Result;

use super::options::{KeyFilter, ReadOptions};

/// A forward cursor over an ordered byte keyspace.
///
/// Every sorted data source (engine cursors, filtered views, the
/// intent-aware merged view) implements this trait, so the seek algorithms
/// are written once against it.
pub trait KvIterator {
    /// Positions the cursor at the first key.
    fn seek_to_first(&mut self) -> Result<()>;

    /// Positions the cursor at the first key `>= key`.
    fn seek(&mut self, key: &[u8]) -> Result<()>;

    /// Advances to the next key. Must only be called when `valid()`.
    fn next(&mut self) -> Result<()>;

    /// Returns true if the cursor is positioned at an entry.
    fn valid(&self) -> bool;

    /// Returns the current key. Empty when not `valid()`.
    fn key(&self) -> &[u8];

    /// Returns the current value. Empty when not `valid()`.
    fn value(&self) -> &[u8];
}

impl<I: KvIterator + ?Sized> KvIterator for Box<I> {
    fn seek_to_first(&mut self) -> Result<()> {
        (**self).seek_to_first()
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        (**self).seek(key)
    }

    fn next(&mut self) -> Result<()> {
        (**self).next()
    }

    fn valid(&self) -> bool {
        (**self).valid()
    }

    fn key(&self) -> &[u8] {
        (**self).key()
    }

    fn value(&self) -> &[u8] {
        (**self).value()
    }
}

/// Applies the per-read restrictions of [`ReadOptions`] on top of a raw cursor.
///
/// Keys outside the restricted prefix end the iteration; keys rejected by the
/// key filter are stepped over.
pub struct FilteredIterator<I> {
    inner: I,
    prefix: Option<Vec<u8>>,
    key_filter: Option<Arc<dyn KeyFilter>>,
    exhausted: bool,
}

impl<I: KvIterator> FilteredIterator<I> {
    pub fn new(inner: I, options: &ReadOptions) -> Self {
        Self {
            inner,
            prefix: options.restricted_prefix().map(<[u8]>::to_vec),
            key_filter: options.key_filter.clone(),
            exhausted: false,
        }
    }

    /// Returns the wrapped cursor.
    pub fn into_inner(self) -> I {
        self.inner
    }

    fn settle(&mut self) -> Result<()> {
        self.exhausted = false;
        while self.inner.valid() {
            if let Some(prefix) = &self.prefix {
                let key = self.inner.key();
                if !key.starts_with(prefix) {
                    if key < prefix.as_slice() {
                        self.inner.seek(prefix)?;
                        continue;
                    }
                    self.exhausted = true;
                    return Ok(());
                }
            }
            let rejected = match &self.key_filter {
                Some(filter) => !filter.may_contain(self.inner.key()),
                None => false,
            };
            if !rejected {
                return Ok(());
            }
            self.inner.next()?;
        }
        Ok(())
    }
}

impl<I: KvIterator> KvIterator for FilteredIterator<I> {
    fn seek_to_first(&mut self) -> Result<()> {
        match &self.prefix {
            Some(prefix) => self.inner.seek(prefix)?,
            None => self.inner.seek_to_first()?,
        }
        self.settle()
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.inner.seek(key)?;
        self.settle()
    }

    fn next(&mut self) -> Result<()> {
        self.inner.next()?;
        self.settle()
    }

    fn valid(&self) -> bool {
        !self.exhausted && self.inner.valid()
    }

    fn key(&self) -> &[u8] {
        if self.valid() {
            self.inner.key()
        } else {
            &[]
        }
    }

    fn value(&self) -> &[u8] {
        if self.valid() {
            self.inner.value()
        } else {
            &[]
        }
    }
}
