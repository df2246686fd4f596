// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Point-in-time reconstruction of sub-documents.

use std::collections::BTreeMap;

use tracing::trace;

use crate::storage::KvIterator;
use crate::time::HybridTime;

use super::config::SeekConfig;
use super::doc_hybrid_time::DocHybridTime;
use super::doc_key::SubDocKey;
use super::primitive_value::PrimitiveValue;
use super::seek::{seek_out_of_subdoc, seek_past_subkey, seek_to_valid_kv_at_ts};
use super::sub_document::SubDocument;
use super::Result;

/// Reads the sub-document at `sub_doc_key` as of `read_ht`.
///
/// A tombstone or object marker hides every descendant written at or before
/// it, including those of the ancestors of `sub_doc_key`. Expired values read
/// as tombstones. Objects whose marker is missing still appear when they
/// have visible children. Returns `None` when nothing is visible.
pub fn get_subdocument<I: KvIterator + ?Sized>(
    iter: &mut I,
    sub_doc_key: &SubDocKey,
    read_ht: HybridTime,
    config: &SeekConfig,
) -> Result<Option<SubDocument>> {
    let mut root = sub_doc_key.clone();
    root.remove_hybrid_time();
    let overwritten_at = find_ancestor_overwrite_time(iter, &root, read_ht, config)?;
    let doc = build_subdocument(iter, &root, overwritten_at, read_ht, config)?;
    trace!(key = %root, found = doc.is_some(), %overwritten_at, %read_ht, "read sub-document");
    Ok(doc)
}

/// Returns the newest version, as of `read_ht`, stored directly at any
/// strict ancestor of `sub_doc_key`.
///
/// Whatever that version is (tombstone, expired value, marker or primitive),
/// it replaced every version of `sub_doc_key` written at or before it.
/// Returns [`DocHybridTime::MIN`] when no ancestor has a visible version.
pub fn find_ancestor_overwrite_time<I: KvIterator + ?Sized>(
    iter: &mut I,
    sub_doc_key: &SubDocKey,
    read_ht: HybridTime,
    config: &SeekConfig,
) -> Result<DocHybridTime> {
    let mut overwritten_at = DocHybridTime::MIN;
    let mut ancestor = SubDocKey::new(sub_doc_key.doc_key.clone(), Vec::new());
    for (depth, subkey) in sub_doc_key.subkeys.iter().enumerate() {
        let prefix = ancestor.encode(false)?;
        if let Some(found) = seek_to_valid_kv_at_ts(iter, prefix.as_slice(), read_ht, config)? {
            if found.key.num_subkeys() == depth {
                if let Some(found_ht) = found.key.doc_hybrid_time() {
                    overwritten_at = overwritten_at.max(found_ht);
                }
            }
        }
        ancestor.append_subkey(subkey.clone());
    }
    Ok(overwritten_at)
}

fn build_subdocument<I: KvIterator + ?Sized>(
    iter: &mut I,
    key: &SubDocKey,
    mut overwritten_at: DocHybridTime,
    read_ht: HybridTime,
    config: &SeekConfig,
) -> Result<Option<SubDocument>> {
    let prefix = key.encode(false)?;
    let depth = key.num_subkeys();
    let Some(found) = seek_to_valid_kv_at_ts(iter, prefix.as_slice(), read_ht, config)? else {
        return Ok(None);
    };

    let mut has_marker = false;
    if found.key.num_subkeys() == depth {
        let found_ht = found.key.doc_hybrid_time().unwrap_or(DocHybridTime::MIN);
        if found_ht > overwritten_at {
            match found.value.primitive() {
                PrimitiveValue::Tombstone => overwritten_at = found_ht,
                value if value.is_container_marker() => {
                    overwritten_at = found_ht;
                    has_marker = true;
                }
                value => return Ok(Some(SubDocument::Primitive(value.clone()))),
            }
        }
        seek_past_subkey(iter, key, config)?;
    }

    let mut children = BTreeMap::new();
    while iter.valid() && iter.key().starts_with(prefix.as_slice()) {
        let entry = SubDocKey::fully_decode_from(iter.key(), true)?;
        if entry.num_subkeys() <= depth {
            iter.next()?;
            continue;
        }
        let subkey = entry.subkeys[depth].clone();
        let child_key = SubDocKey::new(entry.doc_key, entry.subkeys[..=depth].to_vec());
        if let Some(child) = build_subdocument(iter, &child_key, overwritten_at, read_ht, config)? {
            children.insert(subkey, child);
        }
        seek_out_of_subdoc(iter, &child_key, config)?;
    }

    if children.is_empty() && !has_marker {
        return Ok(None);
    }
    Ok(Some(SubDocument::Object(children)))
}
