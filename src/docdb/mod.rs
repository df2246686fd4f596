// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Document storage on an ordered key-value engine.
//!
//! Every stored entry is one version of one path inside a document:
//!
//! ```text
//! key   = DocKey ‖ subkey* ‖ '#' DocHybridTime
//! value = ['t' ttl] primitive
//! ```
//!
//! The encodings preserve order, so all versions of a path are adjacent,
//! newest first, and directly followed by the path's descendants. Reads at
//! a hybrid time are served by the seek functions in this module, which
//! work over any [`KvIterator`](crate::storage::KvIterator), including the
//! [`IntentAwareIterator`] that overlays uncommitted transaction writes.
//!
//! # Example
//!
//! ```
//! use docdb::docdb::{
//!     DocDb, DocDbConfig, DocKey, DocPath, InitMarkerBehavior, PrimitiveValue, SubDocKey, Value,
//! };
//! use docdb::time::HybridTime;
//!
//! let db = DocDb::in_memory(DocDbConfig::default());
//! let doc = DocKey::from_range(vec![PrimitiveValue::string("user1")]);
//! let path = DocPath::new(&doc, vec![PrimitiveValue::string("name")]).unwrap();
//!
//! let mut batch = db.new_write_batch();
//! batch
//!     .set_primitive(&path, Value::new(PrimitiveValue::string("ada")), InitMarkerBehavior::Required)
//!     .unwrap();
//! db.write(&batch, HybridTime::from_micros(100)).unwrap();
//!
//! let key = SubDocKey::new(doc, vec![PrimitiveValue::string("name")]);
//! let value = db.get(&key, HybridTime::from_micros(150), None).unwrap();
//! assert_eq!(value.unwrap().primitive(), &PrimitiveValue::string("ada"));
//! assert!(db.get(&key, HybridTime::from_micros(50), None).unwrap().is_none());
//! ```

mod config;
mod doc_db;
mod doc_hybrid_time;
mod doc_key;
mod doc_reader;
mod error;
mod intent;
mod intent_aware_iterator;
mod key_bytes;
mod primitive_value;
mod seek;
mod sub_document;
mod value;
mod value_type;
mod write_batch;

#[cfg(test)]
mod test_util;

pub use config::{
    DocDbConfig, DurabilityMode, RocksDbConfig, SeekConfig, SeekKeyCheck,
    DEFAULT_MAX_NEXTS_TO_AVOID_SEEK,
};
pub use doc_db::DocDb;
pub use doc_hybrid_time::{
    DocHybridTime, ENCODED_DOC_HT_SIZE, ENCODED_DOC_HT_SUFFIX_SIZE, MAX_WRITE_ID,
};
pub use doc_key::{best_effort_key_to_string, DocKey, DocPath, SubDocKey};
pub use doc_reader::{find_ancestor_overwrite_time, get_subdocument};
pub use error::{DocDbError, Result};
pub use intent::{
    decode_intent_key, decode_intent_value, encode_intent_key, encode_intent_value,
    encode_transaction_index_key, transaction_index_prefix, DecodedIntentKey,
    REGULAR_KEYSPACE_START,
};
pub use intent_aware_iterator::{create_intent_aware_iterator, IntentAwareIterator};
pub use key_bytes::{to_hex, KeyBytes};
pub use primitive_value::PrimitiveValue;
pub use seek::{
    perform_seek, seek_forward, seek_out_of_subdoc, seek_past_subkey, seek_to_valid_kv_at_ts,
    verify_seek_key, FoundEntry, SeekStats,
};
pub use sub_document::SubDocument;
pub use value::Value;
pub use value_type::ValueType;
pub use write_batch::{
    list_index_seed, prepare_non_transaction_write_batch, prepare_transaction_write_batch,
    DocWriteBatch, InitMarkerBehavior, ListExtendOrder,
};
