// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Point-in-time lookups and cursor positioning over any [`KvIterator`].

use tracing::{debug, enabled, trace, warn, Level};

use crate::storage::KvIterator;
use crate::time::{add_physical_time_to_hybrid_time, HybridTime};

use super::config::{SeekConfig, SeekKeyCheck};
use super::doc_hybrid_time::{DocHybridTime, MAX_WRITE_ID};
use super::doc_key::{best_effort_key_to_string, SubDocKey};
use super::key_bytes::{to_hex, KeyBytes};
use super::value::Value;
use super::value_type::ValueType;
use super::{DocDbError, Result};

/// A decoded entry found by [`seek_to_valid_kv_at_ts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundEntry {
    /// The stored key. For values whose TTL has run out this carries the
    /// expiry instant instead of the write time.
    pub key: SubDocKey,
    pub value: Value,
}

/// How [`perform_seek`] reached its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekStats {
    pub nexts: usize,
    pub seeks: usize,
}

/// Finds the newest version of `search_key` (or of a key inside it) visible at `read_ht`.
///
/// `search_key` is an encoded sub-document key without a timestamp. Entries
/// newer than `read_ht` that belong to descendants are skipped. A value whose
/// TTL ended before `read_ht` is reported as a tombstone written at its
/// expiry instant. Values stored without a TTL use `config.default_ttl`.
pub fn seek_to_valid_kv_at_ts<I: KvIterator + ?Sized>(
    iter: &mut I,
    search_key: &[u8],
    read_ht: HybridTime,
    config: &SeekConfig,
) -> Result<Option<FoundEntry>> {
    let mut seek_key = KeyBytes::from(search_key);
    seek_key.append_doc_hybrid_time(DocHybridTime::for_read(read_ht))?;

    // Descendants written after `read_ht` can sit in front of the version we
    // want when the parent has no object marker. Each pass moves strictly
    // past the previous hit, so this terminates.
    loop {
        perform_seek(iter, seek_key.as_slice(), config)?;
        if !iter.valid() || !iter.key().starts_with(search_key) {
            return Ok(None);
        }
        let (found_ht, _) = DocHybridTime::decode_from_end(iter.key())?;
        if found_ht.hybrid_time <= read_ht {
            break;
        }
        seek_key = KeyBytes::from(iter.key());
        seek_key.replace_last_hybrid_time_for_seek(read_ht)?;
    }

    let mut key = SubDocKey::fully_decode_from(iter.key(), true)?;
    let mut value_bytes = iter.value();
    if let Some(ttl) = Value::decode_ttl(&mut value_bytes)?.or(config.default_ttl) {
        let expiry = add_physical_time_to_hybrid_time(key.hybrid_time(), ttl);
        if read_ht > expiry {
            key.set_hybrid_time_for_read_path(expiry);
            return Ok(Some(FoundEntry {
                key,
                value: Value::tombstone(),
            }));
        }
    }
    let value = Value::decode(iter.value())?;
    Ok(Some(FoundEntry { key, value }))
}

/// Positions `iter` at the first key `>= seek_key`.
///
/// When the cursor is at or before the target, up to
/// `config.max_nexts_to_avoid_seek` single steps are tried before falling
/// back to a native seek. The final position is the same either way.
pub fn perform_seek<I: KvIterator + ?Sized>(
    iter: &mut I,
    seek_key: &[u8],
    config: &SeekConfig,
) -> Result<SeekStats> {
    verify_seek_key(seek_key, config.seek_key_check)?;

    let mut stats = SeekStats::default();
    if seek_key.is_empty() {
        iter.seek_to_first()?;
        stats.seeks += 1;
    } else if !iter.valid() || iter.key() > seek_key {
        iter.seek(seek_key)?;
        stats.seeks += 1;
    } else {
        let max_nexts = config.max_nexts_to_avoid_seek;
        for nexts in 0..=max_nexts {
            if !iter.valid() || iter.key() >= seek_key {
                if config.trace_calls {
                    debug!(nexts, "did next() calls instead of a seek");
                }
                break;
            }
            if nexts < max_nexts {
                iter.next()?;
                stats.nexts += 1;
            } else {
                if config.trace_calls {
                    debug!(nexts = max_nexts, "forced to seek after next() calls");
                }
                iter.seek(seek_key)?;
                stats.seeks += 1;
            }
        }
    }

    if enabled!(Level::TRACE) {
        let landed = if iter.valid() {
            best_effort_key_to_string(iter.key())
        } else {
            "N/A".to_string()
        };
        trace!(
            seek_key = %best_effort_key_to_string(seek_key),
            seek_key_raw = %to_hex(seek_key),
            landed_key = %landed,
            nexts = stats.nexts,
            seeks = stats.seeks,
            "performed seek"
        );
    }
    Ok(stats)
}

/// Checks that a seek key has no timestamp, the minimum timestamp, or one
/// with the maximum write id.
///
/// Keys that only look like they end in a timestamp, or that do not decode
/// as a sub-document key at all, pass.
pub fn verify_seek_key(seek_key: &[u8], check: SeekKeyCheck) -> Result<()> {
    if check == SeekKeyCheck::Off {
        return Ok(());
    }
    let Ok((doc_ht, _)) = DocHybridTime::decode_from_end(seek_key) else {
        return Ok(());
    };
    if doc_ht.write_id == MAX_WRITE_ID || doc_ht == DocHybridTime::MIN {
        return Ok(());
    }
    match SubDocKey::fully_decode_from(seek_key, false) {
        Ok(key) if key.has_hybrid_time() => {}
        _ => return Ok(()),
    }

    let key = best_effort_key_to_string(seek_key);
    match check {
        SeekKeyCheck::Off => Ok(()),
        SeekKeyCheck::Warn => {
            warn!(%key, hybrid_time = %doc_ht, "seek key write id is not the maximum");
            Ok(())
        }
        SeekKeyCheck::Strict => Err(DocDbError::InvalidSeekKey {
            key,
            hybrid_time: doc_ht.to_string(),
        }),
    }
}

/// Seeks to `target` only if the cursor is valid and strictly before it.
///
/// Never moves the cursor backward.
pub fn seek_forward<I: KvIterator + ?Sized>(
    iter: &mut I,
    target: &[u8],
    config: &SeekConfig,
) -> Result<()> {
    if !iter.valid() || iter.key() >= target {
        return Ok(());
    }
    perform_seek(iter, target, config)?;
    Ok(())
}

/// Moves past every version of `sub_doc_key` itself, landing on its first descendant or beyond.
pub fn seek_past_subkey<I: KvIterator + ?Sized>(
    iter: &mut I,
    sub_doc_key: &SubDocKey,
    config: &SeekConfig,
) -> Result<()> {
    let mut key = sub_doc_key.encode(false)?;
    key.append_doc_hybrid_time(DocHybridTime::MIN)?;
    seek_forward(iter, key.as_slice(), config)
}

/// Moves past `sub_doc_key` and everything inside it.
pub fn seek_out_of_subdoc<I: KvIterator + ?Sized>(
    iter: &mut I,
    sub_doc_key: &SubDocKey,
    config: &SeekConfig,
) -> Result<()> {
    let mut key = sub_doc_key.encode(false)?;
    key.append_value_type(ValueType::MaxByte);
    seek_forward(iter, key.as_slice(), config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::docdb::test_util::{doc_key, dht, ht, put, put_raw};
    use crate::docdb::PrimitiveValue;
    use crate::storage::{KvEngine, MemEngine, ReadOptions};

    fn config() -> SeekConfig {
        SeekConfig::default().with_seek_key_check(SeekKeyCheck::Strict)
    }

    fn search_key(doc: &str, subkeys: &[&str]) -> Vec<u8> {
        SubDocKey::new(
            doc_key(doc),
            subkeys.iter().map(|s| PrimitiveValue::string(*s)).collect(),
        )
        .encode(false)
        .unwrap()
        .into_vec()
    }

    fn string_value(s: &str) -> Value {
        Value::new(PrimitiveValue::string(s))
    }

    #[test]
    fn test_finds_latest_version_at_or_before_read_time() {
        let engine = MemEngine::new();
        for t in [5, 10, 20] {
            put(&engine, "a", &[], dht(t, 0), &string_value(&format!("v{t}")));
        }
        let mut iter = engine.iterator(&ReadOptions::new());
        let key = search_key("a", &[]);

        let found = seek_to_valid_kv_at_ts(&mut iter, &key, ht(12), &config())
            .unwrap()
            .unwrap();
        assert_eq!(found.value, string_value("v10"));
        assert_eq!(found.key.hybrid_time(), ht(10));

        let found = seek_to_valid_kv_at_ts(&mut iter, &key, ht(20), &config())
            .unwrap()
            .unwrap();
        assert_eq!(found.value, string_value("v20"));

        assert!(seek_to_valid_kv_at_ts(&mut iter, &key, ht(3), &config())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_same_time_writes_ordered_by_write_id() {
        let engine = MemEngine::new();
        put(&engine, "a", &[], dht(10, 0), &string_value("first"));
        put(&engine, "a", &[], dht(10, 1), &string_value("second"));
        let mut iter = engine.iterator(&ReadOptions::new());

        let found = seek_to_valid_kv_at_ts(&mut iter, &search_key("a", &[]), ht(10), &config())
            .unwrap()
            .unwrap();
        assert_eq!(found.value, string_value("second"));
        assert_eq!(found.key.doc_hybrid_time(), Some(dht(10, 1)));
    }

    #[test]
    fn test_skips_newer_descendants_without_marker() {
        let engine = MemEngine::new();
        put(&engine, "a", &["b"], dht(20, 0), &string_value("b@20"));
        put(&engine, "a", &["c"], dht(10, 0), &string_value("c@10"));
        let mut iter = engine.iterator(&ReadOptions::new());

        let found = seek_to_valid_kv_at_ts(&mut iter, &search_key("a", &[]), ht(15), &config())
            .unwrap()
            .unwrap();
        assert_eq!(found.key.subkeys, vec![PrimitiveValue::string("c")]);
        assert_eq!(found.value, string_value("c@10"));
    }

    #[test]
    fn test_does_not_match_sibling_documents() {
        let engine = MemEngine::new();
        put(&engine, "b", &[], dht(1, 0), &string_value("other"));
        let mut iter = engine.iterator(&ReadOptions::new());
        assert!(
            seek_to_valid_kv_at_ts(&mut iter, &search_key("a", &[]), ht(5), &config())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_ttl_expiry_synthesizes_tombstone() {
        let engine = MemEngine::new();
        let write = DocHybridTime::new(HybridTime::from_micros(100_000), 0).unwrap();
        let value = Value::with_ttl(PrimitiveValue::string("v"), Duration::from_millis(50));
        put(&engine, "a", &[], write, &value);
        let mut iter = engine.iterator(&ReadOptions::new());
        let key = search_key("a", &[]);

        let live = seek_to_valid_kv_at_ts(&mut iter, &key, HybridTime::from_micros(150_000), &config())
            .unwrap()
            .unwrap();
        assert_eq!(live.value, value);
        assert_eq!(live.key.doc_hybrid_time(), Some(write));

        let expired =
            seek_to_valid_kv_at_ts(&mut iter, &key, HybridTime::from_micros(150_001), &config())
                .unwrap()
                .unwrap();
        assert!(expired.value.is_tombstone());
        assert_eq!(expired.key.hybrid_time(), HybridTime::from_micros(150_000));
        assert_eq!(
            expired.key.doc_hybrid_time().map(|d| d.write_id),
            Some(MAX_WRITE_ID)
        );
    }

    #[test]
    fn test_default_ttl_applies_only_without_own_ttl() {
        let engine = MemEngine::new();
        let write = dht(100_000, 0);
        put(&engine, "a", &[], write, &string_value("plain"));
        put(
            &engine,
            "b",
            &[],
            write,
            &Value::with_ttl(PrimitiveValue::string("own"), Duration::from_millis(500)),
        );
        let table_ttl = config().with_default_ttl(Some(Duration::from_millis(50)));
        let mut iter = engine.iterator(&ReadOptions::new());

        let plain = seek_to_valid_kv_at_ts(&mut iter, &search_key("a", &[]), ht(200_000), &table_ttl)
            .unwrap()
            .unwrap();
        assert!(plain.value.is_tombstone());
        assert_eq!(plain.key.hybrid_time(), ht(150_000));

        let own = seek_to_valid_kv_at_ts(&mut iter, &search_key("b", &[]), ht(200_000), &table_ttl)
            .unwrap()
            .unwrap();
        assert_eq!(own.value.primitive(), &PrimitiveValue::string("own"));

        let no_default =
            seek_to_valid_kv_at_ts(&mut iter, &search_key("a", &[]), ht(200_000), &config())
                .unwrap()
                .unwrap();
        assert_eq!(no_default.value, string_value("plain"));
    }

    #[test]
    fn test_corrupt_suffix_propagates() {
        let engine = MemEngine::new();
        let mut bad = search_key("a", &[]);
        bad.extend_from_slice(&[0xff, 0xff, 0xff]);
        put_raw(&engine, &bad, b"$");
        let mut iter = engine.iterator(&ReadOptions::new());

        let err = seek_to_valid_kv_at_ts(&mut iter, &search_key("a", &[]), ht(5), &config())
            .unwrap_err();
        assert!(err.is_corruption());
    }

    fn engine_with_keys(keys: &[&[u8]]) -> MemEngine {
        let engine = MemEngine::new();
        for key in keys {
            put_raw(&engine, key, b"v");
        }
        engine
    }

    #[test]
    fn test_perform_seek_steps_when_close() {
        let engine = engine_with_keys(&[b"a", b"b", b"c", b"d"]);
        let mut iter = engine.iterator(&ReadOptions::new());
        iter.seek(b"a").unwrap();

        let stats = perform_seek(&mut iter, b"c", &config()).unwrap();
        assert_eq!(stats, SeekStats { nexts: 2, seeks: 0 });
        assert_eq!(iter.key(), b"c");
    }

    #[test]
    fn test_perform_seek_falls_back_after_budget() {
        let keys: Vec<Vec<u8>> = (0u8..20).map(|i| vec![b'k', i]).collect();
        let refs: Vec<&[u8]> = keys.iter().map(Vec::as_slice).collect();
        let engine = engine_with_keys(&refs);
        let mut iter = engine.iterator(&ReadOptions::new());
        iter.seek_to_first().unwrap();

        let stats = perform_seek(&mut iter, &[b'k', 15], &config()).unwrap();
        assert_eq!(stats, SeekStats { nexts: 8, seeks: 1 });
        assert_eq!(iter.key(), &[b'k', 15]);
    }

    #[test]
    fn test_perform_seek_backward_and_empty() {
        let engine = engine_with_keys(&[b"a", b"b", b"c"]);
        let mut iter = engine.iterator(&ReadOptions::new());
        iter.seek(b"c").unwrap();

        let stats = perform_seek(&mut iter, b"a", &config()).unwrap();
        assert_eq!(stats, SeekStats { nexts: 0, seeks: 1 });
        assert_eq!(iter.key(), b"a");

        iter.seek(b"c").unwrap();
        perform_seek(&mut iter, b"", &config()).unwrap();
        assert_eq!(iter.key(), b"a");
    }

    #[test]
    fn test_seek_forward_never_moves_backward() {
        let engine = engine_with_keys(&[b"a", b"b", b"c"]);
        let mut iter = engine.iterator(&ReadOptions::new());
        iter.seek(b"b").unwrap();

        seek_forward(&mut iter, b"a", &config()).unwrap();
        assert_eq!(iter.key(), b"b");
        seek_forward(&mut iter, b"b", &config()).unwrap();
        assert_eq!(iter.key(), b"b");
        seek_forward(&mut iter, b"bb", &config()).unwrap();
        assert_eq!(iter.key(), b"c");
    }

    #[test]
    fn test_seek_past_and_out_of_subdoc() {
        let engine = MemEngine::new();
        put(&engine, "a", &[], dht(5, 0), &Value::new(PrimitiveValue::Object));
        put(&engine, "a", &[], dht(3, 0), &Value::new(PrimitiveValue::Object));
        put(&engine, "a", &["x"], dht(4, 0), &string_value("x"));
        put(&engine, "b", &[], dht(1, 0), &string_value("b"));
        let mut iter = engine.iterator(&ReadOptions::new());
        iter.seek_to_first().unwrap();

        let a = SubDocKey::new(doc_key("a"), vec![]);
        seek_past_subkey(&mut iter, &a, &config()).unwrap();
        let landed = SubDocKey::fully_decode_from(iter.key(), true).unwrap();
        assert_eq!(landed.subkeys, vec![PrimitiveValue::string("x")]);

        seek_out_of_subdoc(&mut iter, &a, &config()).unwrap();
        let landed = SubDocKey::fully_decode_from(iter.key(), true).unwrap();
        assert_eq!(landed.doc_key, doc_key("b"));
    }

    #[test]
    fn test_verify_seek_key() {
        let base = SubDocKey::new(doc_key("a"), vec![]);
        let encode_with = |doc_ht: DocHybridTime| {
            let mut key = base.encode(false).unwrap();
            key.append_doc_hybrid_time(doc_ht).unwrap();
            key.into_vec()
        };

        let bad = encode_with(dht(5, 3));
        let err = verify_seek_key(&bad, SeekKeyCheck::Strict).unwrap_err();
        assert!(matches!(err, DocDbError::InvalidSeekKey { .. }));
        assert!(verify_seek_key(&bad, SeekKeyCheck::Warn).is_ok());
        assert!(verify_seek_key(&bad, SeekKeyCheck::Off).is_ok());

        for good in [
            encode_with(DocHybridTime::for_read(ht(5))),
            encode_with(DocHybridTime::MIN),
            base.encode(false).unwrap().into_vec(),
        ] {
            assert!(verify_seek_key(&good, SeekKeyCheck::Strict).is_ok());
        }

        let mut engine_iter_key = bad.clone();
        engine_iter_key.insert(0, 0xfe);
        assert!(verify_seek_key(&engine_iter_key, SeekKeyCheck::Strict).is_ok());
    }

    #[test]
    fn test_perform_seek_rejects_bad_key_when_strict() {
        let engine = MemEngine::new();
        let mut iter = engine.iterator(&ReadOptions::new());
        let mut key = SubDocKey::new(doc_key("a"), vec![]).encode(false).unwrap();
        key.append_doc_hybrid_time(dht(1, 1)).unwrap();
        assert!(perform_seek(&mut iter, key.as_slice(), &config()).is_err());
    }
}
