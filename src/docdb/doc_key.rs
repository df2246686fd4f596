// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hierarchical document keys.
//!
//! Layout of an encoded [`SubDocKey`]:
//!
//! ```text
//! ['G' hash:u16 BE hashed_components... '!'] range_components... '!'
//!     subkeys...
//!     ['#' doc_hybrid_time]
//! ```
//!
//! Byte order of the encoding is document-tree pre-order, and within one
//! sub-document path versions are ordered newest first.

use std::cmp::Ordering;
use std::fmt;

use crate::time::HybridTime;

use super::doc_hybrid_time::{DocHybridTime, ENCODED_DOC_HT_SIZE};
use super::key_bytes::{consume_byte, decode_u16, to_hex, KeyBytes};
use super::primitive_value::PrimitiveValue;
use super::value_type::ValueType;
use super::{DocDbError, Result};

/// The key of a top-level document (a row).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocKey {
    hash: Option<u16>,
    hashed_group: Vec<PrimitiveValue>,
    range_group: Vec<PrimitiveValue>,
}

impl DocKey {
    /// A key made only of range components.
    pub fn from_range(range_group: Vec<PrimitiveValue>) -> Self {
        Self {
            hash: None,
            hashed_group: Vec::new(),
            range_group,
        }
    }

    /// A hash-partitioned key.
    pub fn hashed(
        hash: u16,
        hashed_group: Vec<PrimitiveValue>,
        range_group: Vec<PrimitiveValue>,
    ) -> Self {
        Self {
            hash: Some(hash),
            hashed_group,
            range_group,
        }
    }

    pub fn hash_value(&self) -> Option<u16> {
        self.hash
    }

    pub fn hashed_group(&self) -> &[PrimitiveValue] {
        &self.hashed_group
    }

    pub fn range_group(&self) -> &[PrimitiveValue] {
        &self.range_group
    }

    pub fn append_to(&self, key: &mut KeyBytes) -> Result<()> {
        if let Some(hash) = self.hash {
            key.append_value_type(ValueType::UInt16Hash);
            key.append_u16(hash);
            append_group(&self.hashed_group, key)?;
        }
        append_group(&self.range_group, key)
    }

    pub fn encode(&self) -> Result<KeyBytes> {
        let mut key = KeyBytes::new();
        self.append_to(&mut key)?;
        Ok(key)
    }

    /// Decodes a doc key from the front of `input`, leaving the rest.
    pub fn decode_from(input: &mut &[u8]) -> Result<Self> {
        let mut doc_key = DocKey::default();
        if input.first() == Some(&ValueType::UInt16Hash.as_byte()) {
            *input = &input[1..];
            doc_key.hash = Some(decode_u16(input)?);
            doc_key.hashed_group = decode_group(input)?;
        }
        doc_key.range_group = decode_group(input)?;
        Ok(doc_key)
    }

    /// The first byte of the encoding.
    fn leading_byte(&self) -> u8 {
        if self.hash.is_some() {
            return ValueType::UInt16Hash.as_byte();
        }
        self.range_group
            .first()
            .map_or(ValueType::GroupEnd.as_byte(), |c| c.value_type().as_byte())
    }
}

fn append_group(group: &[PrimitiveValue], key: &mut KeyBytes) -> Result<()> {
    for component in group {
        component.append_to_key(key)?;
    }
    key.append_value_type(ValueType::GroupEnd);
    Ok(())
}

fn decode_group(input: &mut &[u8]) -> Result<Vec<PrimitiveValue>> {
    let mut group = Vec::new();
    loop {
        match input.first() {
            None => {
                return Err(DocDbError::Corruption(
                    "doc key group is missing its end marker".to_string(),
                ))
            }
            Some(&b) if b == ValueType::GroupEnd.as_byte() => {
                *input = &input[1..];
                return Ok(group);
            }
            Some(_) => group.push(PrimitiveValue::decode_from_key(input)?),
        }
    }
}

impl Ord for DocKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.hash, other.hash) {
            (Some(a), Some(b)) => a
                .cmp(&b)
                .then_with(|| self.hashed_group.cmp(&other.hashed_group))
                .then_with(|| self.range_group.cmp(&other.range_group)),
            (None, None) => self.range_group.cmp(&other.range_group),
            // The group end byte sorts before every component, so a shorter
            // group compares less, matching slice order.
            _ => self.leading_byte().cmp(&other.leading_byte()),
        }
    }
}

impl PartialOrd for DocKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn fmt_components(f: &mut fmt::Formatter<'_>, components: &[PrimitiveValue]) -> fmt::Result {
    write!(f, "[")?;
    for (i, component) in components.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{component}")?;
    }
    write!(f, "]")
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocKey(")?;
        if let Some(hash) = self.hash {
            write!(f, "0x{hash:04x}, ")?;
            fmt_components(f, &self.hashed_group)?;
            write!(f, ", ")?;
        }
        fmt_components(f, &self.range_group)?;
        write!(f, ")")
    }
}

/// A path into a document, optionally pinned to one stored version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SubDocKey {
    pub doc_key: DocKey,
    pub subkeys: Vec<PrimitiveValue>,
    pub doc_ht: Option<DocHybridTime>,
}

impl SubDocKey {
    pub fn new(doc_key: DocKey, subkeys: Vec<PrimitiveValue>) -> Self {
        Self {
            doc_key,
            subkeys,
            doc_ht: None,
        }
    }

    pub fn with_hybrid_time(
        doc_key: DocKey,
        subkeys: Vec<PrimitiveValue>,
        doc_ht: DocHybridTime,
    ) -> Self {
        Self {
            doc_key,
            subkeys,
            doc_ht: Some(doc_ht),
        }
    }

    pub fn has_hybrid_time(&self) -> bool {
        self.doc_ht.is_some()
    }

    pub fn doc_hybrid_time(&self) -> Option<DocHybridTime> {
        self.doc_ht
    }

    /// The hybrid time component, or [`HybridTime::MIN`] when the key has none.
    pub fn hybrid_time(&self) -> HybridTime {
        self.doc_ht.map_or(HybridTime::MIN, |dht| dht.hybrid_time)
    }

    /// Pins the key to `ht` the way reads do, with the maximum write id.
    pub fn set_hybrid_time_for_read_path(&mut self, ht: HybridTime) {
        self.doc_ht = Some(DocHybridTime::for_read(ht));
    }

    pub fn remove_hybrid_time(&mut self) {
        self.doc_ht = None;
    }

    pub fn append_subkey(&mut self, subkey: PrimitiveValue) {
        self.subkeys.push(subkey);
    }

    pub fn num_subkeys(&self) -> usize {
        self.subkeys.len()
    }

    /// Returns true if `self` is `ancestor` or lies inside it. Timestamps are ignored.
    pub fn starts_with(&self, ancestor: &SubDocKey) -> bool {
        self.doc_key == ancestor.doc_key && self.subkeys.starts_with(&ancestor.subkeys)
    }

    /// The enclosing sub-document without a timestamp, or `None` at the document root.
    pub fn parent(&self) -> Option<SubDocKey> {
        let (_, rest) = self.subkeys.split_last()?;
        Some(SubDocKey::new(self.doc_key.clone(), rest.to_vec()))
    }

    pub fn encode(&self, include_hybrid_time: bool) -> Result<KeyBytes> {
        let mut key = self.doc_key.encode()?;
        for subkey in &self.subkeys {
            subkey.append_to_key(&mut key)?;
        }
        if include_hybrid_time {
            if let Some(doc_ht) = self.doc_ht {
                doc_ht.append_encoded_to(&mut key)?;
            }
        }
        Ok(key)
    }

    /// Decodes `bytes` completely.
    ///
    /// Fails with `Corruption` on malformed input, on trailing bytes after the
    /// timestamp, and on a missing timestamp when `require_hybrid_time` is set.
    pub fn fully_decode_from(bytes: &[u8], require_hybrid_time: bool) -> Result<Self> {
        let mut input = bytes;
        let doc_key = DocKey::decode_from(&mut input)?;
        let mut subkeys = Vec::new();
        let mut doc_ht = None;

        while let Some(&first) = input.first() {
            if first == ValueType::HybridTime.as_byte() {
                consume_byte(&mut input, "hybrid time tag")?;
                if input.len() != ENCODED_DOC_HT_SIZE {
                    return Err(DocDbError::Corruption(format!(
                        "expected {ENCODED_DOC_HT_SIZE} bytes of hybrid time at end of key, got {}",
                        input.len()
                    )));
                }
                doc_ht = Some(DocHybridTime::decode(input)?);
                break;
            }
            subkeys.push(PrimitiveValue::decode_from_key(&mut input)?);
        }

        if require_hybrid_time && doc_ht.is_none() {
            return Err(DocDbError::Corruption(format!(
                "no hybrid time at end of key {}",
                to_hex(bytes)
            )));
        }

        Ok(Self {
            doc_key,
            subkeys,
            doc_ht,
        })
    }
}

impl Ord for SubDocKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.doc_key
            .cmp(&other.doc_key)
            .then_with(|| self.subkeys.cmp(&other.subkeys))
            .then_with(|| match (self.doc_ht, other.doc_ht) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                // Newer versions first.
                (Some(a), Some(b)) => b.cmp(&a),
            })
    }
}

impl PartialOrd for SubDocKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SubDocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubDocKey({}, ", self.doc_key)?;
        write!(f, "[")?;
        for (i, subkey) in self.subkeys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{subkey}")?;
        }
        if let Some(doc_ht) = self.doc_ht {
            if !self.subkeys.is_empty() {
                write!(f, "; ")?;
            }
            write!(f, "{doc_ht}")?;
        }
        write!(f, "])")
    }
}

/// A write target: the encoded doc key plus the sub-key path under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPath {
    encoded_doc_key: KeyBytes,
    subkeys: Vec<PrimitiveValue>,
}

impl DocPath {
    pub fn new(doc_key: &DocKey, subkeys: Vec<PrimitiveValue>) -> Result<Self> {
        Ok(Self {
            encoded_doc_key: doc_key.encode()?,
            subkeys,
        })
    }

    pub fn encoded_doc_key(&self) -> &KeyBytes {
        &self.encoded_doc_key
    }

    pub fn subkeys(&self) -> &[PrimitiveValue] {
        &self.subkeys
    }

    /// Returns the path extended by one sub-key.
    pub fn child(&self, subkey: PrimitiveValue) -> Self {
        let mut subkeys = self.subkeys.clone();
        subkeys.push(subkey);
        Self {
            encoded_doc_key: self.encoded_doc_key.clone(),
            subkeys,
        }
    }
}

/// Renders a raw engine key for logs: the decoded key when possible, hex otherwise.
pub fn best_effort_key_to_string(bytes: &[u8]) -> String {
    if let Ok(key) = SubDocKey::fully_decode_from(bytes, false) {
        return key.to_string();
    }
    if let Some((&first, rest)) = bytes.split_first() {
        if first == ValueType::IntentPrefix.as_byte() {
            if let Ok(key) = SubDocKey::fully_decode_from(rest, false) {
                return format!("Intent({key})");
            }
        }
    }
    to_hex(bytes)
}
