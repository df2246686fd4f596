// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! A merged view of committed records and transaction intents.
//!
//! Two cursors run side by side: one over committed data and one over the
//! intent keyspace. Each intent group (every intent written for one
//! sub-document key) is resolved to at most one entry, surfaced as if it
//! were a committed record:
//!
//! - intents of the reading transaction appear at `(high_ht, write_id)`
//! - intents of a transaction committed at `t <= high_ht` appear at `(t, write_id)`
//! - anything else is skipped
//!
//! Committed records newer than `high_ht` are never surfaced.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::storage::{FilteredIterator, KvEngine, KvIterator, ReadOptions};
use crate::time::HybridTime;
use crate::txn::{TransactionId, TransactionOperationContext, TransactionStatus};

use super::doc_hybrid_time::{DocHybridTime, ENCODED_DOC_HT_SUFFIX_SIZE};
use super::doc_key::{best_effort_key_to_string, SubDocKey};
use super::intent::{decode_intent_key, decode_intent_value, REGULAR_KEYSPACE_START};
use super::key_bytes::KeyBytes;
use super::value_type::ValueType;
use super::Result;

/// Builds an [`IntentAwareIterator`] over `engine`.
///
/// Own intents surface at `high_ht`, so reads through this iterator must use
/// `read_ht == high_ht`. A seek at an earlier read time skips them and falls
/// back to committed data.
///
/// The intent cursor is created first. Each engine cursor reads its own
/// snapshot, so a transaction applied between the two creations is then
/// seen at least once instead of not at all.
pub fn create_intent_aware_iterator<'a, E: KvEngine>(
    engine: &'a E,
    options: &ReadOptions,
    txn_ctx: Option<TransactionOperationContext>,
    high_ht: HybridTime,
) -> IntentAwareIterator<FilteredIterator<E::Cursor<'a>>> {
    debug!(
        query_id = options.query_id,
        txn = ?txn_ctx.as_ref().map(|ctx| ctx.transaction_id),
        %high_ht,
        "creating intent-aware iterator"
    );
    match txn_ctx {
        Some(ctx) => {
            let intents = engine.iterator(&intent_read_options(options));
            let regular = engine.iterator(options);
            IntentAwareIterator::with_intents(regular, intents, ctx, high_ht)
        }
        None => IntentAwareIterator::new(engine.iterator(options), high_ht),
    }
}

/// Confines the intent cursor to the intents of the document the read is restricted to.
fn intent_read_options(options: &ReadOptions) -> ReadOptions {
    let mut prefix = vec![ValueType::IntentPrefix.as_byte()];
    if let Some(user_key) = options.restricted_prefix() {
        prefix.extend_from_slice(user_key);
    }
    options.unrestricted().with_bloom_filter(prefix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Current {
    Exhausted,
    Regular,
    Intent,
}

/// The winning intent of one group, re-keyed at its surfaced time.
#[derive(Debug)]
struct ResolvedIntent {
    key: Vec<u8>,
    value: Vec<u8>,
    // Written by the reading transaction itself.
    own: bool,
}

/// Decides which intents the reader may see and at what time.
struct Visibility {
    ctx: TransactionOperationContext,
    high_ht: HybridTime,
    // Commit time per transaction, `None` when invisible. Statuses only move
    // from pending to final, so a final answer never changes.
    resolved: HashMap<TransactionId, Option<HybridTime>>,
}

impl Visibility {
    fn surfaced_time(
        &mut self,
        txn_id: TransactionId,
        intent_ht: DocHybridTime,
    ) -> Result<Option<DocHybridTime>> {
        if txn_id == self.ctx.transaction_id {
            return Ok(Some(DocHybridTime {
                hybrid_time: self.high_ht,
                write_id: intent_ht.write_id,
            }));
        }
        let commit_ht = match self.resolved.get(&txn_id) {
            Some(cached) => *cached,
            None => {
                let status = match self.ctx.status_manager.status(&txn_id) {
                    Ok(status) => Some(status),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e),
                };
                let commit_ht = status.and_then(|s| s.commit_ht());
                if !matches!(status, Some(TransactionStatus::Pending)) {
                    self.resolved.insert(txn_id, commit_ht);
                }
                commit_ht
            }
        };
        Ok(commit_ht
            .filter(|t| *t <= self.high_ht)
            .map(|t| DocHybridTime {
                hybrid_time: t,
                write_id: intent_ht.write_id,
            }))
    }
}

struct IntentCursor<I> {
    iter: I,
    visibility: Visibility,
}

impl<I: KvIterator> IntentCursor<I> {
    fn seek(&mut self, target: &[u8]) -> Result<()> {
        let mut key = Vec::with_capacity(target.len() + 1);
        key.push(ValueType::IntentPrefix.as_byte());
        key.extend_from_slice(target);
        self.iter.seek(&key)
    }

    /// Consumes intent groups until one has a visible intent, returning that intent.
    fn next_visible(&mut self) -> Result<Option<ResolvedIntent>> {
        while self.iter.valid() {
            let group = decode_intent_key(self.iter.key())?.sub_doc_key.to_vec();
            let mut best: Option<(DocHybridTime, DocHybridTime, Vec<u8>, bool)> = None;

            while self.iter.valid() {
                let (intent_ht, in_group) = {
                    let intent = decode_intent_key(self.iter.key())?;
                    (intent.doc_ht, intent.sub_doc_key == group.as_slice())
                };
                if !in_group {
                    break;
                }
                let (txn_id, value) = decode_intent_value(self.iter.value())?;
                if let Some(surfaced) = self.visibility.surfaced_time(txn_id, intent_ht)? {
                    let newer = best
                        .as_ref()
                        .map_or(true, |(s, o, _, _)| (surfaced, intent_ht) > (*s, *o));
                    if newer {
                        let own = txn_id == self.visibility.ctx.transaction_id;
                        best = Some((surfaced, intent_ht, value.to_vec(), own));
                    }
                }
                self.iter.next()?;
            }

            if let Some((surfaced, _, value, own)) = best {
                let mut key = KeyBytes::from(group);
                key.append_doc_hybrid_time(surfaced)?;
                return Ok(Some(ResolvedIntent {
                    key: key.into_vec(),
                    value,
                    own,
                }));
            }
        }
        Ok(None)
    }

    fn next_visible_at_or_after(&mut self, target: &[u8]) -> Result<Option<ResolvedIntent>> {
        while let Some(intent) = self.next_visible()? {
            if intent.key.as_slice() >= target {
                return Ok(Some(intent));
            }
        }
        Ok(None)
    }
}

/// A [`KvIterator`] over committed records merged with the visible intents.
pub struct IntentAwareIterator<I> {
    regular: I,
    intents: Option<IntentCursor<I>>,
    intent: Option<ResolvedIntent>,
    high_ht: HybridTime,
    current: Current,
}

impl<I: KvIterator> IntentAwareIterator<I> {
    /// A view of committed records only.
    pub fn new(regular: I, high_ht: HybridTime) -> Self {
        Self {
            regular,
            intents: None,
            intent: None,
            high_ht,
            current: Current::Exhausted,
        }
    }

    pub fn with_intents(
        regular: I,
        intents: I,
        ctx: TransactionOperationContext,
        high_ht: HybridTime,
    ) -> Self {
        Self {
            regular,
            intents: Some(IntentCursor {
                iter: intents,
                visibility: Visibility {
                    ctx,
                    high_ht,
                    resolved: HashMap::new(),
                },
            }),
            intent: None,
            high_ht,
            current: Current::Exhausted,
        }
    }

    #[inline]
    pub fn high_ht(&self) -> HybridTime {
        self.high_ht
    }

    /// Returns true if the current entry comes from an intent.
    pub fn is_intent(&self) -> bool {
        self.current == Current::Intent
    }

    fn seek_regular(&mut self, key: &[u8]) -> Result<()> {
        let target = if key < REGULAR_KEYSPACE_START {
            REGULAR_KEYSPACE_START
        } else {
            key
        };
        self.regular.seek(target)?;
        self.skip_future_records()
    }

    /// Re-seeks past every committed record newer than `high_ht`.
    fn skip_future_records(&mut self) -> Result<()> {
        while self.regular.valid() {
            let (doc_ht, _) = DocHybridTime::decode_from_end(self.regular.key())?;
            if doc_ht.hybrid_time <= self.high_ht {
                return Ok(());
            }
            trace!(
                key = %best_effort_key_to_string(self.regular.key()),
                high_ht = %self.high_ht,
                "skipping future record"
            );
            let mut target = KeyBytes::from(self.regular.key());
            target.replace_last_hybrid_time_for_seek(self.high_ht)?;
            self.regular.seek(target.as_slice())?;
        }
        Ok(())
    }

    /// Picks the lesser of the two cursors.
    ///
    /// An intent of another transaction that was applied while this
    /// iterator's snapshots were taken has committed copies at the same
    /// hybrid time, under write ids assigned at commit. Those copies win and
    /// the intent is dropped.
    fn update_current(&mut self) -> Result<()> {
        while let (Some(intent), true) = (&self.intent, self.regular.valid()) {
            if intent.own || !same_version(intent.key.as_slice(), self.regular.key())? {
                break;
            }
            trace!(
                key = %best_effort_key_to_string(self.regular.key()),
                "intent already applied"
            );
            self.intent = match self.intents.as_mut() {
                Some(intents) => intents.next_visible()?,
                None => None,
            };
        }
        self.current = match (&self.intent, self.regular.valid()) {
            (None, false) => Current::Exhausted,
            (None, true) => Current::Regular,
            (Some(_), false) => Current::Intent,
            (Some(intent), true) if intent.key.as_slice() <= self.regular.key() => Current::Intent,
            (Some(_), true) => Current::Regular,
        };
        Ok(())
    }
}

/// True when both keys name the same sub-document key at the same hybrid time.
fn same_version(intent_key: &[u8], regular_key: &[u8]) -> Result<bool> {
    let (intent_ht, intent_prefix) = DocHybridTime::decode_from_end(intent_key)?;
    let (regular_ht, regular_prefix) = DocHybridTime::decode_from_end(regular_key)?;
    Ok(intent_prefix == regular_prefix && intent_ht.hybrid_time == regular_ht.hybrid_time)
}

/// The intent keyspace holds keys without a timestamp, so a seek target that ends
/// in one is cut back to its sub-document key.
fn intent_seek_target(key: &[u8]) -> &[u8] {
    match SubDocKey::fully_decode_from(key, true) {
        Ok(_) => &key[..key.len() - ENCODED_DOC_HT_SUFFIX_SIZE],
        Err(_) => key,
    }
}

impl<I: KvIterator> KvIterator for IntentAwareIterator<I> {
    fn seek_to_first(&mut self) -> Result<()> {
        self.seek(&[])
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.seek_regular(key)?;
        if let Some(intents) = self.intents.as_mut() {
            intents.seek(intent_seek_target(key))?;
            self.intent = intents.next_visible_at_or_after(key)?;
        }
        self.update_current()
    }

    fn next(&mut self) -> Result<()> {
        match self.current {
            Current::Exhausted => return Ok(()),
            Current::Regular => {
                self.regular.next()?;
                self.skip_future_records()?;
            }
            Current::Intent => {
                // An own intent hides a committed record at the very same key.
                if let Some(intent) = self.intent.take() {
                    if self.regular.valid() && self.regular.key() == intent.key.as_slice() {
                        self.regular.next()?;
                        self.skip_future_records()?;
                    }
                }
                self.intent = match self.intents.as_mut() {
                    Some(intents) => intents.next_visible()?,
                    None => None,
                };
            }
        }
        self.update_current()
    }

    fn valid(&self) -> bool {
        self.current != Current::Exhausted
    }

    fn key(&self) -> &[u8] {
        match (self.current, &self.intent) {
            (Current::Regular, _) => self.regular.key(),
            (Current::Intent, Some(intent)) => intent.key.as_slice(),
            _ => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match (self.current, &self.intent) {
            (Current::Regular, _) => self.regular.value(),
            (Current::Intent, Some(intent)) => intent.value.as_slice(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::docdb::intent::{encode_intent_key, encode_intent_value};
    use crate::docdb::seek::seek_to_valid_kv_at_ts;
    use crate::docdb::test_util::{dht, ht, put, put_raw, sub_doc_key};
    use crate::docdb::{PrimitiveValue, SeekConfig, Value};
    use crate::storage::MemEngine;
    use crate::txn::LocalTransactionStatusManager;

    struct Fixture {
        engine: MemEngine,
        statuses: Arc<LocalTransactionStatusManager>,
        me: TransactionId,
    }

    impl Fixture {
        fn new() -> Self {
            let statuses = Arc::new(LocalTransactionStatusManager::new());
            let me = TransactionId::generate();
            statuses.register(me).unwrap();
            Self {
                engine: MemEngine::new(),
                statuses,
                me,
            }
        }

        fn other(&self) -> TransactionId {
            let id = TransactionId::generate();
            self.statuses.register(id).unwrap();
            id
        }

        fn intent(&self, txn: TransactionId, subkeys: &[&str], doc_ht: DocHybridTime, v: i64) {
            let sdk = sub_doc_key("doc", subkeys).encode(false).unwrap();
            let key = encode_intent_key(sdk.as_slice(), doc_ht).unwrap();
            let value = Value::new(PrimitiveValue::Int64(v)).encode();
            put_raw(&self.engine, key.as_slice(), &encode_intent_value(&txn, &value));
        }

        fn committed(&self, subkeys: &[&str], doc_ht: DocHybridTime, v: i64) {
            put(
                &self.engine,
                "doc",
                subkeys,
                doc_ht,
                &Value::new(PrimitiveValue::Int64(v)),
            );
        }

        fn iter(&self, high_ht: u64) -> IntentAwareIterator<FilteredIterator<crate::storage::MemCursor>> {
            let ctx = TransactionOperationContext::new(self.me, self.statuses.clone());
            create_intent_aware_iterator(&self.engine, &ReadOptions::new(), Some(ctx), ht(high_ht))
        }
    }

    fn entries<I: KvIterator>(iter: &mut I) -> Vec<(SubDocKey, i64)> {
        let mut out = Vec::new();
        iter.seek_to_first().unwrap();
        while iter.valid() {
            let key = SubDocKey::fully_decode_from(iter.key(), true).unwrap();
            let value = match Value::decode(iter.value()).unwrap().into_primitive() {
                PrimitiveValue::Int64(v) => v,
                other => panic!("unexpected value {other}"),
            };
            out.push((key, value));
            iter.next().unwrap();
        }
        out
    }

    fn at(subkeys: &[&str], doc_ht: DocHybridTime) -> SubDocKey {
        let mut key = sub_doc_key("doc", subkeys);
        key.doc_ht = Some(doc_ht);
        key
    }

    #[test]
    fn test_without_context_only_committed_data() {
        let f = Fixture::new();
        f.committed(&[], dht(5, 0), 1);
        f.intent(f.me, &[], dht(6, 0), 2);

        let mut iter = create_intent_aware_iterator(&f.engine, &ReadOptions::new(), None, ht(10));
        assert_eq!(entries(&mut iter), vec![(at(&[], dht(5, 0)), 1)]);
    }

    #[test]
    fn test_own_intents_surface_at_high_ht() {
        let f = Fixture::new();
        f.committed(&["a"], dht(5, 0), 1);
        f.intent(f.me, &["a"], dht(7, 3), 2);

        let mut iter = f.iter(20);
        assert_eq!(
            entries(&mut iter),
            vec![(at(&["a"], dht(20, 3)), 2), (at(&["a"], dht(5, 0)), 1)]
        );

        let search = sub_doc_key("doc", &["a"]).encode(false).unwrap();
        let found = seek_to_valid_kv_at_ts(&mut iter, search.as_slice(), ht(20), &SeekConfig::default())
            .unwrap()
            .unwrap();
        assert!(iter.is_intent());
        assert_eq!(found.key.doc_hybrid_time(), Some(dht(20, 3)));
        assert_eq!(found.value.primitive(), &PrimitiveValue::Int64(2));
    }

    #[test]
    fn test_other_transactions_resolve_by_status() {
        let f = Fixture::new();
        let committed_early = f.other();
        let committed_late = f.other();
        let pending = f.other();
        let aborted = f.other();
        let unknown = TransactionId::generate();

        f.intent(committed_early, &["a"], dht(3, 1), 10);
        f.intent(committed_late, &["b"], dht(3, 0), 20);
        f.intent(pending, &["c"], dht(3, 0), 30);
        f.intent(aborted, &["d"], dht(3, 0), 40);
        f.intent(unknown, &["e"], dht(3, 0), 50);

        f.statuses.commit(committed_early, ht(8)).unwrap();
        f.statuses.commit(committed_late, ht(30)).unwrap();
        f.statuses.abort(aborted).unwrap();

        let mut iter = f.iter(20);
        assert_eq!(entries(&mut iter), vec![(at(&["a"], dht(8, 1)), 10)]);
    }

    #[test]
    fn test_future_committed_records_hidden() {
        let f = Fixture::new();
        for t in [5, 10, 20] {
            f.committed(&[], dht(t, 0), t as i64);
        }
        f.committed(&["x"], dht(30, 0), 30);

        let mut iter = f.iter(15);
        assert_eq!(
            entries(&mut iter),
            vec![(at(&[], dht(10, 0)), 10), (at(&[], dht(5, 0)), 5)]
        );
    }

    #[test]
    fn test_only_newest_intent_per_key() {
        let f = Fixture::new();
        f.intent(f.me, &["a"], dht(5, 0), 1);
        f.intent(f.me, &["a"], dht(5, 1), 2);
        f.intent(f.me, &["a", "b"], dht(5, 2), 3);

        let mut iter = f.iter(9);
        assert_eq!(
            entries(&mut iter),
            vec![(at(&["a"], dht(9, 1)), 2), (at(&["a", "b"], dht(9, 2)), 3)]
        );
    }

    #[test]
    fn test_merge_keeps_key_order() {
        let f = Fixture::new();
        let other = f.other();
        f.committed(&["a"], dht(4, 0), 1);
        f.committed(&["c"], dht(4, 0), 3);
        f.intent(f.me, &["b"], dht(6, 0), 2);
        f.intent(other, &["d"], dht(6, 0), 4);
        f.statuses.commit(other, ht(7)).unwrap();

        let mut iter = f.iter(10);
        let got = entries(&mut iter);
        assert_eq!(
            got,
            vec![
                (at(&["a"], dht(4, 0)), 1),
                (at(&["b"], dht(10, 0)), 2),
                (at(&["c"], dht(4, 0)), 3),
                (at(&["d"], dht(7, 0)), 4),
            ]
        );
    }

    #[test]
    fn test_applied_and_visible_intent_shown_once() {
        let f = Fixture::new();
        let other = f.other();
        f.intent(other, &["a"], dht(3, 0), 7);
        f.statuses.commit(other, ht(8)).unwrap();
        f.committed(&["a"], dht(8, 0), 7);

        let mut iter = f.iter(10);
        assert_eq!(entries(&mut iter), vec![(at(&["a"], dht(8, 0)), 7)]);
    }

    #[test]
    fn test_applied_intent_with_other_write_id_shown_once() {
        let f = Fixture::new();
        let other = f.other();
        f.intent(other, &["a"], dht(12, 3), 7);
        f.statuses.commit(other, ht(16)).unwrap();
        f.committed(&["a"], dht(16, 0), 7);
        f.committed(&["b"], dht(4, 0), 8);

        let mut iter = f.iter(20);
        assert_eq!(
            entries(&mut iter),
            vec![(at(&["a"], dht(16, 0)), 7), (at(&["b"], dht(4, 0)), 8)]
        );
    }

    #[test]
    fn test_own_intent_wins_over_record_at_high_ht() {
        let f = Fixture::new();
        f.committed(&["a"], dht(9, 0), 1);
        f.intent(f.me, &["a"], dht(6, 0), 2);

        let mut iter = f.iter(9);
        assert_eq!(entries(&mut iter), vec![(at(&["a"], dht(9, 0)), 2)]);
    }

    #[test]
    fn test_own_intents_need_read_at_high_ht() {
        let f = Fixture::new();
        f.committed(&["a"], dht(5, 0), 1);
        f.intent(f.me, &["a"], dht(7, 0), 2);
        let search = sub_doc_key("doc", &["a"]).encode(false).unwrap();
        let config = SeekConfig::default();

        let mut iter = f.iter(20);
        let at_high = seek_to_valid_kv_at_ts(&mut iter, search.as_slice(), ht(20), &config)
            .unwrap()
            .unwrap();
        assert_eq!(at_high.value.primitive(), &PrimitiveValue::Int64(2));

        let mut iter = f.iter(20);
        let below_high = seek_to_valid_kv_at_ts(&mut iter, search.as_slice(), ht(19), &config)
            .unwrap()
            .unwrap();
        assert_eq!(below_high.value.primitive(), &PrimitiveValue::Int64(1));
    }

    #[test]
    fn test_seek_skips_intents_before_target() {
        let f = Fixture::new();
        f.intent(f.me, &["a"], dht(5, 0), 1);
        f.intent(f.me, &["b"], dht(5, 0), 2);

        let mut iter = f.iter(9);
        let mut target = sub_doc_key("doc", &["a"]).encode(false).unwrap();
        target.append_doc_hybrid_time(DocHybridTime::MIN).unwrap();
        iter.seek(target.as_slice()).unwrap();

        assert!(iter.valid());
        let key = SubDocKey::fully_decode_from(iter.key(), true).unwrap();
        assert_eq!(key, at(&["b"], dht(9, 0)));
    }

    #[test]
    fn test_bloom_restricted_read_sees_document_intents() {
        let f = Fixture::new();
        f.intent(f.me, &["a"], dht(5, 0), 1);
        let other_doc = sub_doc_key("zzz", &[]).encode(false).unwrap();
        let key = encode_intent_key(other_doc.as_slice(), dht(5, 0)).unwrap();
        let value = Value::new(PrimitiveValue::Int64(9)).encode();
        put_raw(&f.engine, key.as_slice(), &encode_intent_value(&f.me, &value));

        let doc = sub_doc_key("doc", &[]).encode(false).unwrap();
        let options = ReadOptions::new().with_bloom_filter(doc.into_vec());
        let ctx = TransactionOperationContext::new(f.me, f.statuses.clone());
        let mut iter = create_intent_aware_iterator(&f.engine, &options, Some(ctx), ht(9));
        assert_eq!(entries(&mut iter), vec![(at(&["a"], dht(9, 0)), 1)]);
    }
}
