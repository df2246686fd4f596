// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! A document store over one [`KvEngine`].
//!
//! `DocDb` ties the pieces together: it timestamps and writes document
//! batches, records transaction outcomes and applies or removes their
//! intents, and serves point-in-time reads through the intent-aware view.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::storage::{FilteredIterator, KvEngine, KvIterator, KvWriteBatch, MemEngine, ReadOptions, RocksEngine};
use crate::time::{Clock, HybridClock, HybridTime};
use crate::txn::{
    LocalTransactionStatusManager, TransactionId, TransactionOperationContext, TransactionStatus,
    TransactionStatusManager,
};

use super::config::DocDbConfig;
use super::doc_hybrid_time::DocHybridTime;
use super::doc_key::{best_effort_key_to_string, SubDocKey};
use super::doc_reader;
use super::intent::{decode_intent_key, decode_intent_value, transaction_index_prefix};
use super::intent_aware_iterator::{create_intent_aware_iterator, IntentAwareIterator};
use super::key_bytes::{to_hex, KeyBytes};
use super::seek::seek_to_valid_kv_at_ts;
use super::sub_document::SubDocument;
use super::value::Value;
use super::value_type::ValueType;
use super::write_batch::{
    list_index_seed, prepare_non_transaction_write_batch, prepare_transaction_write_batch,
    DocWriteBatch,
};
use super::{DocDbError, Result};

/// One intent of a transaction, located through the reverse index.
struct StoredIntent {
    index_key: Vec<u8>,
    intent_key: Vec<u8>,
    sub_doc_key: Vec<u8>,
    doc_ht: DocHybridTime,
    value: Vec<u8>,
}

/// Document database over an ordered key-value engine.
pub struct DocDb<E> {
    engine: E,
    clock: Arc<dyn Clock>,
    status_manager: Arc<LocalTransactionStatusManager>,
    // Next list index, shared by every batch of this store.
    list_counter: Arc<AtomicI64>,
    config: DocDbConfig,
}

impl DocDb<RocksEngine> {
    /// Opens or creates a RocksDB-backed store at `path`.
    pub fn open_rocksdb(path: impl AsRef<Path>, config: DocDbConfig) -> Result<Self> {
        let engine = RocksEngine::open(path.as_ref(), &config.rocksdb)?;
        Ok(Self::new(engine, config))
    }
}

impl DocDb<MemEngine> {
    pub fn in_memory(config: DocDbConfig) -> Self {
        Self::new(MemEngine::new(), config)
    }
}

impl<E: KvEngine> DocDb<E> {
    pub fn new(engine: E, config: DocDbConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(HybridClock::default());
        Self {
            engine,
            list_counter: Arc::new(AtomicI64::new(list_index_seed(&*clock))),
            clock,
            status_manager: Arc::new(LocalTransactionStatusManager::new()),
            config,
        }
    }

    /// Replaces the clock. List indexes are re-seeded from it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.list_counter
            .store(list_index_seed(&*clock), Ordering::Relaxed);
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &DocDbConfig {
        &self.config
    }

    pub fn status_manager(&self) -> &Arc<LocalTransactionStatusManager> {
        &self.status_manager
    }

    /// Current hybrid time of the store's clock.
    pub fn now(&self) -> HybridTime {
        self.clock.now()
    }

    /// Starts a batch that can look up ancestors for init markers.
    pub fn new_write_batch(&self) -> DocWriteBatch<'_> {
        DocWriteBatch::with_reader(self.engine.iterator(&ReadOptions::new()), self.config.seek)
            .with_list_counter(self.list_counter.clone())
    }

    /// Writes `batch` as committed records at `hybrid_time`.
    pub fn write(&self, batch: &DocWriteBatch<'_>, hybrid_time: HybridTime) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let kv = prepare_non_transaction_write_batch(batch, hybrid_time)?;
        self.engine.write(kv)?;
        self.clock.update(hybrid_time);
        debug!(entries = batch.len(), %hybrid_time, "wrote document batch");
        Ok(())
    }

    /// Registers a new pending transaction.
    pub fn begin_transaction(&self) -> Result<TransactionId> {
        let id = TransactionId::generate();
        self.status_manager.register(id)?;
        Ok(id)
    }

    pub fn transaction_context(&self, txn_id: TransactionId) -> TransactionOperationContext {
        let status_manager: Arc<dyn TransactionStatusManager> = self.status_manager.clone();
        TransactionOperationContext::new(txn_id, status_manager)
    }

    /// Writes `batch` as intents of the pending transaction `txn_id`.
    pub fn write_transactional(
        &self,
        batch: &DocWriteBatch<'_>,
        hybrid_time: HybridTime,
        txn_id: TransactionId,
    ) -> Result<()> {
        if self.status_manager.status(&txn_id)? != TransactionStatus::Pending {
            return Err(DocDbError::TransactionNotPending(txn_id.to_string()));
        }
        if batch.is_empty() {
            return Ok(());
        }
        let kv = prepare_transaction_write_batch(batch, hybrid_time, &txn_id)?;
        self.engine.write(kv)?;
        self.clock.update(hybrid_time);
        debug!(txn = %txn_id, entries = batch.len(), %hybrid_time, "wrote intents");
        Ok(())
    }

    /// Commits `txn_id` at `commit_ht` and rewrites its intents as committed records.
    ///
    /// Returns the number of intents applied.
    pub fn commit_transaction(&self, txn_id: TransactionId, commit_ht: HybridTime) -> Result<usize> {
        self.status_manager.commit(txn_id, commit_ht)?;

        let mut intents = self.stored_intents(&txn_id)?;
        // Write ids are reassigned in write order so every applied record is distinct.
        intents.sort_by_key(|intent| intent.doc_ht);

        let mut batch = KvWriteBatch::new();
        for (index, intent) in intents.iter().enumerate() {
            let write_id = u32::try_from(index).unwrap_or(u32::MAX);
            let mut key = KeyBytes::from(intent.sub_doc_key.as_slice());
            key.append_doc_hybrid_time(DocHybridTime::new(commit_ht, write_id)?)?;
            batch.put(key.into_vec(), intent.value.as_slice());
            batch.delete(intent.intent_key.as_slice());
            batch.delete(intent.index_key.as_slice());
        }
        self.engine.write(batch)?;
        self.clock.update(commit_ht);
        info!(txn = %txn_id, applied = intents.len(), %commit_ht, "committed transaction");
        Ok(intents.len())
    }

    /// Aborts `txn_id` and removes its intents. Returns the number removed.
    pub fn abort_transaction(&self, txn_id: TransactionId) -> Result<usize> {
        self.status_manager.abort(txn_id)?;

        let intents = self.stored_intents(&txn_id)?;
        let mut batch = KvWriteBatch::new();
        for intent in &intents {
            batch.delete(intent.intent_key.as_slice());
            batch.delete(intent.index_key.as_slice());
        }
        self.engine.write(batch)?;
        info!(txn = %txn_id, removed = intents.len(), "aborted transaction");
        Ok(intents.len())
    }

    fn stored_intents(&self, txn_id: &TransactionId) -> Result<Vec<StoredIntent>> {
        let prefix = transaction_index_prefix(txn_id);
        let mut index = self
            .engine
            .iterator(&ReadOptions::new().with_bloom_filter(prefix.as_slice()));
        let mut intents = self.engine.iterator(&ReadOptions::new());

        let mut out = Vec::new();
        index.seek(prefix.as_slice())?;
        while index.valid() {
            let (doc_ht, _) = DocHybridTime::decode_from_end(index.key())?;
            let intent_key = index.value().to_vec();
            intents.seek(&intent_key)?;
            if !intents.valid() || intents.key() != intent_key.as_slice() {
                return Err(DocDbError::Corruption(format!(
                    "index entry of transaction {txn_id} points at missing intent {}",
                    to_hex(&intent_key)
                )));
            }
            let (owner, value) = decode_intent_value(intents.value())?;
            if owner != *txn_id {
                return Err(DocDbError::Corruption(format!(
                    "intent {} belongs to {owner}, indexed under {txn_id}",
                    to_hex(&intent_key)
                )));
            }
            let value = value.to_vec();
            let sub_doc_key = decode_intent_key(&intent_key)?.sub_doc_key.to_vec();
            out.push(StoredIntent {
                index_key: index.key().to_vec(),
                intent_key,
                sub_doc_key,
                doc_ht,
                value,
            });
            index.next()?;
        }
        Ok(out)
    }

    /// A cursor over committed data only, without timestamp filtering.
    pub fn create_iterator(&self, options: &ReadOptions) -> FilteredIterator<E::Cursor<'_>> {
        self.engine.iterator(options)
    }

    pub fn create_intent_aware_iterator(
        &self,
        options: &ReadOptions,
        txn_ctx: Option<TransactionOperationContext>,
        high_ht: HybridTime,
    ) -> IntentAwareIterator<FilteredIterator<E::Cursor<'_>>> {
        create_intent_aware_iterator(&self.engine, options, txn_ctx, high_ht)
    }

    fn document_iterator(
        &self,
        key: &SubDocKey,
        read_ht: HybridTime,
        txn: Option<TransactionId>,
    ) -> Result<IntentAwareIterator<FilteredIterator<E::Cursor<'_>>>> {
        let options = ReadOptions::new().with_bloom_filter(key.doc_key.encode()?.into_vec());
        let txn_ctx = txn.map(|id| self.transaction_context(id));
        Ok(self.create_intent_aware_iterator(&options, txn_ctx, read_ht))
    }

    /// The newest live value stored exactly at `key` as of `read_ht`.
    ///
    /// A value is hidden once an ancestor was deleted, expired or replaced
    /// after it. With `txn`, that transaction's own intents and the intents
    /// of transactions committed by `read_ht` are included.
    pub fn get(
        &self,
        key: &SubDocKey,
        read_ht: HybridTime,
        txn: Option<TransactionId>,
    ) -> Result<Option<Value>> {
        let mut iter = self.document_iterator(key, read_ht, txn)?;
        let mut search = key.clone();
        search.remove_hybrid_time();
        let overwritten_at =
            doc_reader::find_ancestor_overwrite_time(&mut iter, &search, read_ht, &self.config.seek)?;
        let found = seek_to_valid_kv_at_ts(
            &mut iter,
            search.encode(false)?.as_slice(),
            read_ht,
            &self.config.seek,
        )?;
        Ok(found
            .filter(|entry| entry.key.num_subkeys() == key.num_subkeys())
            .filter(|entry| entry.key.doc_hybrid_time().is_some_and(|t| t > overwritten_at))
            .map(|entry| entry.value)
            .filter(|value| !value.is_tombstone()))
    }

    pub fn get_subdocument(
        &self,
        key: &SubDocKey,
        read_ht: HybridTime,
        txn: Option<TransactionId>,
    ) -> Result<Option<SubDocument>> {
        let mut iter = self.document_iterator(key, read_ht, txn)?;
        doc_reader::get_subdocument(&mut iter, key, read_ht, &self.config.seek)
    }

    pub fn flush(&self) -> Result<()> {
        self.engine.flush()
    }

    /// Renders every stored entry, one per line, for debugging.
    pub fn debug_dump(&self) -> Result<String> {
        let mut iter = self.engine.iterator(&ReadOptions::new());
        iter.seek_to_first()?;
        let mut out = String::new();
        while iter.valid() {
            let _ = writeln!(
                out,
                "{} -> {}",
                best_effort_key_to_string(iter.key()),
                describe_value(iter.key(), iter.value())
            );
            iter.next()?;
        }
        Ok(out)
    }
}

fn describe_value(key: &[u8], value: &[u8]) -> String {
    match key.first().copied() {
        Some(b) if b == ValueType::IntentPrefix.as_byte() => match decode_intent_value(value) {
            Ok((txn_id, value)) => format!("{txn_id} {}", describe_plain_value(value)),
            Err(_) => to_hex(value),
        },
        Some(b) if b == ValueType::TransactionIndexPrefix.as_byte() => {
            best_effort_key_to_string(value)
        }
        _ => describe_plain_value(value),
    }
}

fn describe_plain_value(bytes: &[u8]) -> String {
    match Value::decode(bytes) {
        Ok(value) => match value.ttl() {
            Some(ttl) => format!("{}; ttl: {ttl:?}", value.primitive()),
            None => value.primitive().to_string(),
        },
        Err(_) => to_hex(bytes),
    }
}
