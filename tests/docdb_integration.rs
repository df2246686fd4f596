// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests over the public API on both engines.

use std::sync::Arc;
use std::time::Duration;

use docdb::docdb::{
    perform_seek, seek_to_valid_kv_at_ts, DocDb, DocDbConfig, DocKey, DocPath, InitMarkerBehavior,
    PrimitiveValue, SeekConfig, SubDocKey, SubDocument, Value,
};
use docdb::storage::{KvEngine, KvIterator, ReadOptions};
use docdb::time::{HybridTime, ManualClock};
use tempfile::TempDir;

fn ht(micros: u64) -> HybridTime {
    HybridTime::from_micros(micros)
}

fn user(name: &str) -> DocKey {
    DocKey::hashed(
        0x1234,
        vec![PrimitiveValue::string(name)],
        vec![PrimitiveValue::Int64(1)],
    )
}

fn path(doc: &DocKey, subkeys: &[&str]) -> DocPath {
    DocPath::new(doc, subkeys.iter().map(|s| PrimitiveValue::string(*s)).collect()).unwrap()
}

fn key(doc: &DocKey, subkeys: &[&str]) -> SubDocKey {
    SubDocKey::new(
        doc.clone(),
        subkeys.iter().map(|s| PrimitiveValue::string(*s)).collect(),
    )
}

fn write_profile<E: KvEngine>(db: &DocDb<E>, doc: &DocKey, at: u64, city: &str) {
    let mut batch = db.new_write_batch();
    batch
        .set_primitive(
            &path(doc, &["name"]),
            Value::new(PrimitiveValue::string("ada")),
            InitMarkerBehavior::Required,
        )
        .unwrap();
    batch
        .set_primitive(
            &path(doc, &["address", "city"]),
            Value::new(PrimitiveValue::string(city)),
            InitMarkerBehavior::Required,
        )
        .unwrap();
    db.write(&batch, ht(at)).unwrap();
}

fn city<E: KvEngine>(db: &DocDb<E>, doc: &DocKey, at: u64) -> Option<String> {
    match db.get(&key(doc, &["address", "city"]), ht(at), None).unwrap()?.into_primitive() {
        PrimitiveValue::String(s) => Some(s),
        other => panic!("unexpected city {other}"),
    }
}

#[test]
fn test_rocksdb_end_to_end() {
    let dir = TempDir::new().unwrap();
    let doc = user("ada");
    {
        let db = DocDb::open_rocksdb(dir.path(), DocDbConfig::default())
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(1)));
        write_profile(&db, &doc, 100, "london");
        write_profile(&db, &doc, 200, "paris");

        assert_eq!(city(&db, &doc, 150).as_deref(), Some("london"));
        assert_eq!(city(&db, &doc, 250).as_deref(), Some("paris"));
        assert_eq!(city(&db, &doc, 50), None);
        db.flush().unwrap();
    }

    let db = DocDb::open_rocksdb(dir.path(), DocDbConfig::default()).unwrap();
    assert_eq!(city(&db, &doc, 150).as_deref(), Some("london"));

    let profile = db
        .get_subdocument(&key(&doc, &[]), ht(250), None)
        .unwrap()
        .unwrap();
    let city_path = [PrimitiveValue::string("address"), PrimitiveValue::string("city")];
    assert_eq!(
        profile.get_path(&city_path).and_then(SubDocument::as_primitive),
        Some(&PrimitiveValue::string("paris"))
    );
    assert!(profile.child(&PrimitiveValue::string("name")).is_some());
}

#[test]
fn test_rocksdb_transaction_lifecycle() {
    let dir = TempDir::new().unwrap();
    let db = DocDb::open_rocksdb(dir.path(), DocDbConfig::default()).unwrap();
    let doc = user("bob");
    write_profile(&db, &doc, 100, "rome");

    let writer = db.begin_transaction().unwrap();
    let reader = db.begin_transaction().unwrap();
    let mut batch = db.new_write_batch();
    batch
        .set_primitive(
            &path(&doc, &["address", "city"]),
            Value::new(PrimitiveValue::string("oslo")),
            InitMarkerBehavior::Optional,
        )
        .unwrap();
    db.write_transactional(&batch, ht(150), writer).unwrap();

    let read = |txn, at| match db.get(&key(&doc, &["address", "city"]), ht(at), txn).unwrap() {
        Some(value) => value.primitive().to_string(),
        None => "none".to_string(),
    };
    assert_eq!(read(Some(writer), 160), "\"oslo\"");
    assert_eq!(read(Some(reader), 160), "\"rome\"");
    assert_eq!(read(None, 160), "\"rome\"");

    assert_eq!(db.commit_transaction(writer, ht(170)).unwrap(), 1);
    assert_eq!(read(Some(reader), 165), "\"rome\"");
    assert_eq!(read(Some(reader), 175), "\"oslo\"");
    assert_eq!(read(None, 175), "\"oslo\"");

    let dump = db.debug_dump().unwrap();
    assert!(!dump.contains("Intent("));
}

#[test]
fn test_ttl_expiry_in_memory() {
    let db = DocDb::in_memory(DocDbConfig::default());
    let doc = user("eve");
    let mut batch = db.new_write_batch();
    batch
        .set_primitive(
            &path(&doc, &["session"]),
            Value::with_ttl(PrimitiveValue::string("token"), Duration::from_millis(50)),
            InitMarkerBehavior::Optional,
        )
        .unwrap();
    db.write(&batch, ht(100_000)).unwrap();

    let session = key(&doc, &["session"]);
    assert!(db.get(&session, ht(150_000), None).unwrap().is_some());
    assert!(db.get(&session, ht(150_001), None).unwrap().is_none());

    // The expired entry reads as a tombstone written at the expiry instant.
    let mut iter = db.create_iterator(&ReadOptions::new());
    let found = seek_to_valid_kv_at_ts(
        &mut iter,
        session.encode(false).unwrap().as_slice(),
        ht(150_001),
        &SeekConfig::default(),
    )
    .unwrap()
    .unwrap();
    assert!(found.value.is_tombstone());
    assert_eq!(found.key.hybrid_time(), ht(150_000));
}

#[test]
fn test_seek_heuristic_on_rocksdb() {
    let dir = TempDir::new().unwrap();
    let db = DocDb::open_rocksdb(dir.path(), DocDbConfig::default()).unwrap();
    let doc = user("many");
    let mut batch = db.new_write_batch();
    for i in 0..32 {
        batch
            .set_primitive(
                &path(&doc, &[format!("field{i:02}").as_str()]),
                Value::new(PrimitiveValue::Int64(i)),
                InitMarkerBehavior::Optional,
            )
            .unwrap();
    }
    db.write(&batch, ht(10)).unwrap();

    let config = SeekConfig::default();
    let target = |i: usize| {
        let mut k = key(&doc, &[format!("field{i:02}").as_str()]).encode(false).unwrap();
        k.append_doc_hybrid_time(docdb::DocHybridTime::for_read(ht(10))).unwrap();
        k
    };

    let mut iter = db.create_iterator(&ReadOptions::new());
    iter.seek_to_first().unwrap();
    let near = perform_seek(&mut iter, target(3).as_slice(), &config).unwrap();
    assert_eq!((near.nexts, near.seeks), (3, 0));

    let far = perform_seek(&mut iter, target(30).as_slice(), &config).unwrap();
    assert_eq!((far.nexts, far.seeks), (8, 1));

    let back = perform_seek(&mut iter, target(1).as_slice(), &config).unwrap();
    assert_eq!((back.nexts, back.seeks), (0, 1));
    let landed = SubDocKey::fully_decode_from(iter.key(), true).unwrap();
    assert_eq!(landed.subkeys, vec![PrimitiveValue::string("field01")]);
}
