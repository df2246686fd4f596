// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-read engine options.

use std::fmt;
use std::sync::Arc;

/// Identifier attached to a read for diagnostics.
pub type QueryId = u64;

/// Query id used when the caller does not provide one.
pub const DEFAULT_QUERY_ID: QueryId = 0;

/// A pluggable per-read filter over raw engine keys.
///
/// Keys for which `may_contain` answers false are skipped by the iterator.
pub trait KeyFilter: Send + Sync {
    fn may_contain(&self, key: &[u8]) -> bool;
}

impl<F> KeyFilter for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn may_contain(&self, key: &[u8]) -> bool {
        self(key)
    }
}

/// Whether a read may restrict itself to the keys of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BloomFilterMode {
    /// Restrict the read to `user_key_for_filter`.
    UseBloomFilter,
    /// Scan the whole keyspace.
    #[default]
    DontUseBloomFilter,
}

/// Options for creating an engine iterator.
#[derive(Clone, Default)]
pub struct ReadOptions {
    /// Diagnostics tag carried into log events.
    pub query_id: QueryId,

    pub bloom_filter_mode: BloomFilterMode,

    /// Encoded doc key the read is confined to under `UseBloomFilter`.
    pub user_key_for_filter: Option<Vec<u8>>,

    pub key_filter: Option<Arc<dyn KeyFilter>>,
}

impl ReadOptions {
    /// Creates options for an unrestricted read.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_id(mut self, query_id: QueryId) -> Self {
        self.query_id = query_id;
        self
    }

    /// Confines the read to keys starting with `user_key`.
    pub fn with_bloom_filter(mut self, user_key: impl Into<Vec<u8>>) -> Self {
        self.bloom_filter_mode = BloomFilterMode::UseBloomFilter;
        self.user_key_for_filter = Some(user_key.into());
        self
    }

    pub fn with_key_filter(mut self, filter: Arc<dyn KeyFilter>) -> Self {
        self.key_filter = Some(filter);
        self
    }

    /// Returns the key prefix the read is confined to, if any.
    pub fn restricted_prefix(&self) -> Option<&[u8]> {
        match self.bloom_filter_mode {
            BloomFilterMode::UseBloomFilter => self.user_key_for_filter.as_deref(),
            BloomFilterMode::DontUseBloomFilter => None,
        }
    }

    /// Returns a copy without the per-read key restrictions, keeping the query id.
    pub fn unrestricted(&self) -> Self {
        Self {
            query_id: self.query_id,
            ..Self::default()
        }
    }
}

impl fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("query_id", &self.query_id)
            .field("bloom_filter_mode", &self.bloom_filter_mode)
            .field("user_key_for_filter", &self.user_key_for_filter)
            .field("key_filter", &self.key_filter.is_some())
            .finish()
    }
}

/// Returns the shortest key greater than every key that starts with `prefix`.
///
/// Returns `None` when `prefix` is empty or all `0xff`, in which case no such key exists.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let position = prefix.iter().rposition(|&b| b != 0xff)?;
    let mut successor = prefix[..=position].to_vec();
    successor[position] += 1;
    Some(successor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(prefix_successor(&[0x01, 0xff, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0xff, 0xff]), None);
        assert_eq!(prefix_successor(&[]), None);
    }

    #[test]
    fn test_restricted_prefix_requires_mode() {
        let mut opts = ReadOptions::new().with_bloom_filter(b"doc".to_vec());
        assert_eq!(opts.restricted_prefix(), Some(&b"doc"[..]));

        opts.bloom_filter_mode = BloomFilterMode::DontUseBloomFilter;
        assert_eq!(opts.restricted_prefix(), None);
    }

    #[test]
    fn test_closure_key_filter() {
        let filter: Arc<dyn KeyFilter> = Arc::new(|key: &[u8]| key.first() == Some(&b'a'));
        assert!(filter.may_contain(b"abc"));
        assert!(!filter.may_contain(b"bcd"));
    }

    #[test]
    fn test_unrestricted_keeps_query_id() {
        let opts = ReadOptions::new()
            .with_query_id(42)
            .with_bloom_filter(b"doc".to_vec());
        let plain = opts.unrestricted();
        assert_eq!(plain.query_id, 42);
        assert_eq!(plain.restricted_prefix(), None);
    }
}
