// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the DocDB unit tests.

use crate::storage::{KvEngine, KvWriteBatch};
use crate::time::HybridTime;

use super::{DocHybridTime, DocKey, PrimitiveValue, SubDocKey, Value};

pub(crate) fn ht(micros: u64) -> HybridTime {
    HybridTime::from_micros(micros)
}

pub(crate) fn dht(micros: u64, write_id: u32) -> DocHybridTime {
    DocHybridTime::new(ht(micros), write_id).unwrap()
}

pub(crate) fn doc_key(name: &str) -> DocKey {
    DocKey::from_range(vec![PrimitiveValue::string(name)])
}

pub(crate) fn sub_doc_key(doc: &str, subkeys: &[&str]) -> SubDocKey {
    SubDocKey::new(
        doc_key(doc),
        subkeys.iter().map(|s| PrimitiveValue::string(*s)).collect(),
    )
}

/// Writes one committed version of `doc.subkeys...`.
pub(crate) fn put<E: KvEngine>(
    engine: &E,
    doc: &str,
    subkeys: &[&str],
    doc_ht: DocHybridTime,
    value: &Value,
) {
    let mut key = sub_doc_key(doc, subkeys);
    key.doc_ht = Some(doc_ht);
    put_raw(engine, key.encode(true).unwrap().as_slice(), &value.encode());
}

pub(crate) fn put_raw<E: KvEngine>(engine: &E, key: &[u8], value: &[u8]) {
    let mut batch = KvWriteBatch::new();
    batch.put(key.to_vec(), value.to_vec());
    engine.write(batch).unwrap();
}
