// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Document-level write batches and their conversion to engine batches.
//!
//! A [`DocWriteBatch`] collects `(key without timestamp, value)` pairs. The
//! timestamp is assigned when the batch is prepared: every entry gets the
//! batch's hybrid time and a write id equal to its position, so later entries
//! win over earlier ones for the same key.
//!
//! Lists are stored as objects keyed by [`PrimitiveValue::ArrayIndex`].
//! Indexes come from a counter shared by every batch of a store: appended
//! elements take the next value, prepended ones its negation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::storage::{KvIterator, KvWriteBatch};
use crate::time::{Clock, HybridClock, HybridTime};
use crate::txn::TransactionId;

use super::config::SeekConfig;
use super::doc_hybrid_time::DocHybridTime;
use super::doc_reader::get_subdocument;
use super::doc_key::{best_effort_key_to_string, DocPath, SubDocKey};
use super::intent::{encode_intent_key, encode_intent_value, encode_transaction_index_key};
use super::key_bytes::KeyBytes;
use super::primitive_value::PrimitiveValue;
use super::seek::perform_seek;
use super::sub_document::SubDocument;
use super::value::Value;
use super::{DocDbError, Result};

/// Whether a write makes sure every ancestor has an object marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMarkerBehavior {
    /// Look ancestors up and write a marker for each one that is not an object.
    Required,
    /// Write only the value itself.
    #[default]
    Optional,
}

/// Where [`DocWriteBatch::extend_list`] places new elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListExtendOrder {
    #[default]
    Append,
    Prepend,
}

/// Starting point for list indexes handed out by a new store.
///
/// Seeding from the physical clock keeps indexes of a restarted store above
/// those of earlier runs as long as fewer than one index per microsecond was used.
pub fn list_index_seed(clock: &dyn Clock) -> i64 {
    i64::try_from(clock.now().physical_micros()).unwrap_or(i64::MAX / 2)
}

/// A batch of document mutations, not yet timestamped.
pub struct DocWriteBatch<'a> {
    reader: Option<Box<dyn KvIterator + 'a>>,
    config: SeekConfig,
    entries: Vec<(KeyBytes, Value)>,
    // Per encoded key: whether it is an object as of the last entry in this batch.
    object_cache: HashMap<KeyBytes, bool>,
    list_counter: Arc<AtomicI64>,
}

impl DocWriteBatch<'static> {
    /// A batch that cannot look up existing data, so only
    /// [`InitMarkerBehavior::Optional`] writes are accepted.
    pub fn new() -> Self {
        Self {
            reader: None,
            config: SeekConfig::default(),
            entries: Vec::new(),
            object_cache: HashMap::new(),
            list_counter: Arc::new(AtomicI64::new(list_index_seed(&HybridClock::default()))),
        }
    }
}

impl Default for DocWriteBatch<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DocWriteBatch<'a> {
    /// A batch that checks for ancestor objects through `reader`.
    pub fn with_reader(reader: impl KvIterator + 'a, config: SeekConfig) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            config,
            entries: Vec::new(),
            object_cache: HashMap::new(),
            list_counter: Arc::new(AtomicI64::new(list_index_seed(&HybridClock::default()))),
        }
    }

    /// Shares the list index counter with other batches of the same store.
    pub fn with_list_counter(mut self, counter: Arc<AtomicI64>) -> Self {
        self.list_counter = counter;
        self
    }

    pub fn set_primitive(
        &mut self,
        path: &DocPath,
        value: Value,
        behavior: InitMarkerBehavior,
    ) -> Result<()> {
        let key = self.encode_path(path, behavior)?;
        self.push_entry(key, value);
        Ok(())
    }

    fn push_entry(&mut self, key: KeyBytes, value: Value) {
        // Whatever was below this key is replaced.
        self.object_cache
            .retain(|cached, _| !cached.starts_with(key.as_slice()));
        self.object_cache
            .insert(key.clone(), value.primitive().is_container_marker());
        self.entries.push((key, value));
    }

    /// Encodes `path`, first making sure its ancestors are objects when `behavior` asks for it.
    fn encode_path(&mut self, path: &DocPath, behavior: InitMarkerBehavior) -> Result<KeyBytes> {
        let mut key = path.encoded_doc_key().clone();
        for (depth, subkey) in path.subkeys().iter().enumerate() {
            if behavior == InitMarkerBehavior::Required {
                self.ensure_container(&key, depth, PrimitiveValue::Object)?;
            }
            subkey.append_to_key(&mut key)?;
        }
        Ok(key)
    }

    /// Writes `doc` at `path`, replacing what was there.
    pub fn insert_subdocument(
        &mut self,
        path: &DocPath,
        doc: SubDocument,
        behavior: InitMarkerBehavior,
    ) -> Result<()> {
        match doc {
            SubDocument::Primitive(value) => self.set_primitive(path, Value::new(value), behavior),
            SubDocument::Object(children) => {
                self.set_primitive(path, Value::new(PrimitiveValue::Object), behavior)?;
                for (subkey, child) in children {
                    self.insert_subdocument(&path.child(subkey), child, InitMarkerBehavior::Optional)?;
                }
                Ok(())
            }
        }
    }

    /// Merges `doc` into what is stored at `path`.
    ///
    /// No object marker is written for `doc` itself, so stored children that
    /// `doc` does not mention are kept.
    pub fn extend_subdocument(
        &mut self,
        path: &DocPath,
        doc: SubDocument,
        behavior: InitMarkerBehavior,
    ) -> Result<()> {
        match doc {
            SubDocument::Primitive(value) => self.set_primitive(path, Value::new(value), behavior),
            SubDocument::Object(children) => {
                for (subkey, child) in children {
                    self.extend_subdocument(&path.child(subkey), child, behavior)?;
                }
                Ok(())
            }
        }
    }

    /// Adds `items` to the list at `path` under fresh array indexes.
    ///
    /// Stored elements are kept. With [`InitMarkerBehavior::Required`] the
    /// list gets an array marker unless it is already a container.
    pub fn extend_list(
        &mut self,
        path: &DocPath,
        items: Vec<SubDocument>,
        order: ListExtendOrder,
        behavior: InitMarkerBehavior,
    ) -> Result<()> {
        if behavior == InitMarkerBehavior::Required {
            let key = self.encode_path(path, behavior)?;
            self.ensure_container(&key, path.subkeys().len(), PrimitiveValue::Array)?;
        }
        match order {
            ListExtendOrder::Append => {
                for item in items {
                    let index = self.list_counter.fetch_add(1, Ordering::Relaxed);
                    self.insert_list_item(path, index, item)?;
                }
            }
            ListExtendOrder::Prepend => {
                // The first item takes the most negative index so it sorts first.
                for item in items.into_iter().rev() {
                    let index = -self.list_counter.fetch_add(1, Ordering::Relaxed);
                    self.insert_list_item(path, index, item)?;
                }
            }
        }
        Ok(())
    }

    fn insert_list_item(&mut self, path: &DocPath, index: i64, item: SubDocument) -> Result<()> {
        let item_path = path.child(PrimitiveValue::ArrayIndex(index));
        self.insert_subdocument(&item_path, item, InitMarkerBehavior::Optional)
    }

    /// Overwrites list elements by position.
    ///
    /// `positions` are zero-based over the elements visible at `read_ht`, in
    /// index order. A tombstone removes the element. Nothing is written when
    /// a position is past the end of the list.
    pub fn replace_in_list(
        &mut self,
        path: &DocPath,
        positions: &[usize],
        values: Vec<Value>,
        read_ht: HybridTime,
    ) -> Result<()> {
        if positions.len() != values.len() {
            return Err(DocDbError::InvalidArgument(format!(
                "{} list positions given for {} values",
                positions.len(),
                values.len()
            )));
        }
        let indexes = self.stored_list_indexes(path, read_ht)?;
        let mut targets = Vec::with_capacity(positions.len());
        for &position in positions {
            let Some(index) = indexes.get(position) else {
                return Err(DocDbError::InvalidArgument(format!(
                    "cannot replace list item {position}, the list has {} items",
                    indexes.len()
                )));
            };
            targets.push(path.child(index.clone()));
        }
        for (target, value) in targets.iter().zip(values) {
            self.set_primitive(target, value, InitMarkerBehavior::Optional)?;
        }
        Ok(())
    }

    /// Array indexes of the list at `path` visible at `read_ht`, in order.
    fn stored_list_indexes(&mut self, path: &DocPath, read_ht: HybridTime) -> Result<Vec<PrimitiveValue>> {
        let key = self.encode_path(path, InitMarkerBehavior::Optional)?;
        let list_key = SubDocKey::fully_decode_from(key.as_slice(), false)?;
        let Some(reader) = self.reader.as_mut() else {
            return Err(DocDbError::InvalidArgument(
                "replacing list items needs a batch with a reader".to_string(),
            ));
        };
        Ok(match get_subdocument(&mut **reader, &list_key, read_ht, &self.config)? {
            Some(SubDocument::Object(children)) => children
                .into_keys()
                .filter(|subkey| matches!(subkey, PrimitiveValue::ArrayIndex(_)))
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn delete_subdoc(&mut self, path: &DocPath) -> Result<()> {
        self.set_primitive(path, Value::tombstone(), InitMarkerBehavior::Optional)
    }

    #[inline]
    pub fn entries(&self) -> &[(KeyBytes, Value)] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.object_cache.clear();
    }

    /// Writes `marker` at `key` unless it already holds an object or array.
    fn ensure_container(&mut self, key: &KeyBytes, depth: usize, marker: PrimitiveValue) -> Result<()> {
        let exists = match self.object_cache.get(key) {
            Some(&exists) => exists,
            None => self.is_object_in_storage(key, depth)?,
        };
        if !exists {
            trace!(key = %best_effort_key_to_string(key.as_slice()), %marker, "adding container marker");
            self.entries.push((key.clone(), Value::new(marker)));
        }
        self.object_cache.insert(key.clone(), true);
        Ok(())
    }

    /// Checks whether the newest stored version of `key` is an object or array marker.
    fn is_object_in_storage(&mut self, key: &KeyBytes, depth: usize) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(DocDbError::InvalidArgument(
                "init markers are required but the batch has no reader".to_string(),
            ));
        };
        perform_seek(&mut **reader, key.as_slice(), &self.config)?;
        if !reader.valid() || !reader.key().starts_with(key.as_slice()) {
            return Ok(false);
        }
        let found = SubDocKey::fully_decode_from(reader.key(), false)?;
        if !found.has_hybrid_time() || found.num_subkeys() != depth {
            return Ok(false);
        }
        Ok(Value::decode(reader.value())?.primitive().is_container_marker())
    }
}

fn entry_time(hybrid_time: HybridTime, index: usize) -> Result<DocHybridTime> {
    let write_id = u32::try_from(index).unwrap_or(u32::MAX);
    DocHybridTime::new(hybrid_time, write_id)
}

/// Converts `batch` into committed engine records at `hybrid_time`.
pub fn prepare_non_transaction_write_batch(
    batch: &DocWriteBatch<'_>,
    hybrid_time: HybridTime,
) -> Result<KvWriteBatch> {
    let mut out = KvWriteBatch::new();
    for (index, (key, value)) in batch.entries().iter().enumerate() {
        let mut key = key.clone();
        key.append_doc_hybrid_time(entry_time(hybrid_time, index)?)?;
        out.put(key.into_vec(), value.encode());
    }
    Ok(out)
}

/// Converts `batch` into intents of `txn_id` and their reverse index entries.
///
/// All transactional batches of one transaction must use distinct hybrid times.
pub fn prepare_transaction_write_batch(
    batch: &DocWriteBatch<'_>,
    hybrid_time: HybridTime,
    txn_id: &TransactionId,
) -> Result<KvWriteBatch> {
    let mut out = KvWriteBatch::new();
    for (index, (key, value)) in batch.entries().iter().enumerate() {
        let doc_ht = entry_time(hybrid_time, index)?;
        let intent_key = encode_intent_key(key.as_slice(), doc_ht)?;
        out.put(
            intent_key.as_slice(),
            encode_intent_value(txn_id, &value.encode()),
        );
        out.put(
            encode_transaction_index_key(txn_id, doc_ht)?.into_vec(),
            intent_key.into_vec(),
        );
    }
    Ok(out)
}
