// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Scalar values that appear as key components and as stored payloads.
//!
//! A primitive has two encodings. The key encoding is order-preserving and
//! self-delimiting, so components can be concatenated into a key. The value
//! encoding is a type tag followed by a plain payload and always spans the
//! rest of the buffer.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::key_bytes::{
    consume_array, consume_byte, decode_descending_f64, decode_descending_i64,
    decode_descending_string, decode_f64_ordered, decode_i32_ordered, decode_i64_ordered,
    decode_string_ordered, KeyBytes,
};
use super::value_type::ValueType;
use super::{DocDbError, Result};

#[derive(Debug, Clone)]
pub enum PrimitiveValue {
    Null,
    False,
    True,
    Int32(i32),
    Int64(i64),
    Int64Descending(i64),
    Double(f64),
    DoubleDescending(f64),
    String(String),
    StringDescending(String),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    ArrayIndex(i64),
    ColumnId(i32),
    SystemColumnId(i32),
    /// Marks the existence of an object independent of its children.
    Object,
    /// Marks the existence of an array independent of its elements.
    Array,
    Tombstone,
}

impl PrimitiveValue {
    pub fn string(s: impl Into<String>) -> Self {
        PrimitiveValue::String(s.into())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            PrimitiveValue::Null => ValueType::Null,
            PrimitiveValue::False => ValueType::False,
            PrimitiveValue::True => ValueType::True,
            PrimitiveValue::Int32(_) => ValueType::Int32,
            PrimitiveValue::Int64(_) => ValueType::Int64,
            PrimitiveValue::Int64Descending(_) => ValueType::Int64Descending,
            PrimitiveValue::Double(_) => ValueType::Double,
            PrimitiveValue::DoubleDescending(_) => ValueType::DoubleDescending,
            PrimitiveValue::String(_) => ValueType::String,
            PrimitiveValue::StringDescending(_) => ValueType::StringDescending,
            PrimitiveValue::Timestamp(_) => ValueType::Timestamp,
            PrimitiveValue::ArrayIndex(_) => ValueType::ArrayIndex,
            PrimitiveValue::ColumnId(_) => ValueType::ColumnId,
            PrimitiveValue::SystemColumnId(_) => ValueType::SystemColumnId,
            PrimitiveValue::Object => ValueType::Object,
            PrimitiveValue::Array => ValueType::Array,
            PrimitiveValue::Tombstone => ValueType::Tombstone,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, PrimitiveValue::Tombstone)
    }

    /// Returns true for object and array markers.
    pub fn is_container_marker(&self) -> bool {
        matches!(self, PrimitiveValue::Object | PrimitiveValue::Array)
    }

    /// Appends the order-preserving key encoding.
    pub fn append_to_key(&self, key: &mut KeyBytes) -> Result<()> {
        let value_type = self.value_type();
        if !value_type.is_key_type() {
            return Err(DocDbError::InvalidArgument(format!(
                "{value_type} cannot be used as a key component"
            )));
        }
        key.append_value_type(value_type);
        match self {
            PrimitiveValue::Int32(v)
            | PrimitiveValue::ColumnId(v)
            | PrimitiveValue::SystemColumnId(v) => key.append_i32_ordered(*v),
            PrimitiveValue::Int64(v)
            | PrimitiveValue::Timestamp(v)
            | PrimitiveValue::ArrayIndex(v) => key.append_i64_ordered(*v),
            PrimitiveValue::Int64Descending(v) => key.append_descending_i64(*v),
            PrimitiveValue::Double(v) => key.append_f64_ordered(*v),
            PrimitiveValue::DoubleDescending(v) => key.append_descending_f64(*v),
            PrimitiveValue::String(s) => key.append_string_ordered(s.as_bytes()),
            PrimitiveValue::StringDescending(s) => key.append_descending_string(s.as_bytes()),
            _ => {}
        }
        Ok(())
    }

    /// Decodes one key component from the front of `input`.
    pub fn decode_from_key(input: &mut &[u8]) -> Result<Self> {
        let value_type = ValueType::try_from(consume_byte(input, "key component type")?)?;
        let value = match value_type {
            ValueType::Null => PrimitiveValue::Null,
            ValueType::False => PrimitiveValue::False,
            ValueType::True => PrimitiveValue::True,
            ValueType::Int32 => PrimitiveValue::Int32(decode_i32_ordered(input)?),
            ValueType::ColumnId => PrimitiveValue::ColumnId(decode_i32_ordered(input)?),
            ValueType::SystemColumnId => PrimitiveValue::SystemColumnId(decode_i32_ordered(input)?),
            ValueType::Int64 => PrimitiveValue::Int64(decode_i64_ordered(input)?),
            ValueType::Timestamp => PrimitiveValue::Timestamp(decode_i64_ordered(input)?),
            ValueType::ArrayIndex => PrimitiveValue::ArrayIndex(decode_i64_ordered(input)?),
            ValueType::Int64Descending => {
                PrimitiveValue::Int64Descending(decode_descending_i64(input)?)
            }
            ValueType::Double => PrimitiveValue::Double(decode_f64_ordered(input)?),
            ValueType::DoubleDescending => {
                PrimitiveValue::DoubleDescending(decode_descending_f64(input)?)
            }
            ValueType::String => PrimitiveValue::String(utf8(decode_string_ordered(input)?)?),
            ValueType::StringDescending => {
                PrimitiveValue::StringDescending(utf8(decode_descending_string(input)?)?)
            }
            other => {
                return Err(DocDbError::Corruption(format!(
                    "{other} is not a valid key component type"
                )))
            }
        };
        Ok(value)
    }

    /// Appends the value encoding used for stored payloads.
    pub fn append_value_encoding(&self, out: &mut Vec<u8>) {
        out.push(self.value_type().as_byte());
        match self {
            PrimitiveValue::Int32(v)
            | PrimitiveValue::ColumnId(v)
            | PrimitiveValue::SystemColumnId(v) => out.extend_from_slice(&v.to_be_bytes()),
            PrimitiveValue::Int64(v)
            | PrimitiveValue::Int64Descending(v)
            | PrimitiveValue::Timestamp(v)
            | PrimitiveValue::ArrayIndex(v) => out.extend_from_slice(&v.to_be_bytes()),
            PrimitiveValue::Double(v) | PrimitiveValue::DoubleDescending(v) => {
                out.extend_from_slice(&v.to_bits().to_be_bytes())
            }
            PrimitiveValue::String(s) | PrimitiveValue::StringDescending(s) => {
                out.extend_from_slice(s.as_bytes())
            }
            _ => {}
        }
    }

    pub fn to_value_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.append_value_encoding(&mut out);
        out
    }

    /// Decodes a value encoding that spans all of `bytes`.
    pub fn decode_value(bytes: &[u8]) -> Result<Self> {
        let mut input = bytes;
        let value_type = ValueType::try_from(consume_byte(&mut input, "value type")?)?;
        let value = match value_type {
            ValueType::Null => PrimitiveValue::Null,
            ValueType::False => PrimitiveValue::False,
            ValueType::True => PrimitiveValue::True,
            ValueType::Object => PrimitiveValue::Object,
            ValueType::Array => PrimitiveValue::Array,
            ValueType::Tombstone => PrimitiveValue::Tombstone,
            ValueType::Int32 => PrimitiveValue::Int32(i32::from_be_bytes(fixed(&mut input)?)),
            ValueType::ColumnId => PrimitiveValue::ColumnId(i32::from_be_bytes(fixed(&mut input)?)),
            ValueType::SystemColumnId => {
                PrimitiveValue::SystemColumnId(i32::from_be_bytes(fixed(&mut input)?))
            }
            ValueType::Int64 => PrimitiveValue::Int64(i64::from_be_bytes(fixed(&mut input)?)),
            ValueType::Int64Descending => {
                PrimitiveValue::Int64Descending(i64::from_be_bytes(fixed(&mut input)?))
            }
            ValueType::Timestamp => {
                PrimitiveValue::Timestamp(i64::from_be_bytes(fixed(&mut input)?))
            }
            ValueType::ArrayIndex => {
                PrimitiveValue::ArrayIndex(i64::from_be_bytes(fixed(&mut input)?))
            }
            ValueType::Double => {
                PrimitiveValue::Double(f64::from_bits(u64::from_be_bytes(fixed(&mut input)?)))
            }
            ValueType::DoubleDescending => PrimitiveValue::DoubleDescending(f64::from_bits(
                u64::from_be_bytes(fixed(&mut input)?),
            )),
            ValueType::String => {
                let s = utf8(input.to_vec())?;
                input = &[];
                PrimitiveValue::String(s)
            }
            ValueType::StringDescending => {
                let s = utf8(input.to_vec())?;
                input = &[];
                PrimitiveValue::StringDescending(s)
            }
            other => {
                return Err(DocDbError::Corruption(format!(
                    "{other} is not a valid value type"
                )))
            }
        };
        if !input.is_empty() {
            return Err(DocDbError::Corruption(format!(
                "{} trailing bytes after {value_type} value",
                input.len()
            )));
        }
        Ok(value)
    }
}

fn fixed<const N: usize>(input: &mut &[u8]) -> Result<[u8; N]> {
    consume_array(input, "fixed-width value")
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| DocDbError::Corruption(format!("invalid utf-8: {e}")))
}

impl Ord for PrimitiveValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use PrimitiveValue::*;

        let by_type = self.value_type().cmp(&other.value_type());
        if by_type != Ordering::Equal {
            return by_type;
        }
        match (self, other) {
            (Int32(a), Int32(b))
            | (ColumnId(a), ColumnId(b))
            | (SystemColumnId(a), SystemColumnId(b)) => a.cmp(b),
            (Int64(a), Int64(b)) | (Timestamp(a), Timestamp(b)) | (ArrayIndex(a), ArrayIndex(b)) => {
                a.cmp(b)
            }
            (Int64Descending(a), Int64Descending(b)) => b.cmp(a),
            (Double(a), Double(b)) => a.total_cmp(b),
            (DoubleDescending(a), DoubleDescending(b)) => b.total_cmp(a),
            (String(a), String(b)) => a.cmp(b),
            (StringDescending(a), StringDescending(b)) => b.cmp(a),
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for PrimitiveValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PrimitiveValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PrimitiveValue {}

impl Hash for PrimitiveValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut key = KeyBytes::new();
        // Markers hash by tag only.
        if self.append_to_key(&mut key).is_err() {
            key.append_value_type(self.value_type());
        }
        key.as_slice().hash(state);
    }
}

impl From<&str> for PrimitiveValue {
    fn from(s: &str) -> Self {
        PrimitiveValue::String(s.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(s: String) -> Self {
        PrimitiveValue::String(s)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(v: i64) -> Self {
        PrimitiveValue::Int64(v)
    }
}

impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self {
        PrimitiveValue::Int32(v)
    }
}

impl From<bool> for PrimitiveValue {
    fn from(v: bool) -> Self {
        if v {
            PrimitiveValue::True
        } else {
            PrimitiveValue::False
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Null => write!(f, "null"),
            PrimitiveValue::False => write!(f, "false"),
            PrimitiveValue::True => write!(f, "true"),
            PrimitiveValue::Int32(v) => write!(f, "{v}"),
            PrimitiveValue::Int64(v) => write!(f, "{v}"),
            PrimitiveValue::Int64Descending(v) => write!(f, "{v} (desc)"),
            PrimitiveValue::Double(v) => write!(f, "{v:?}"),
            PrimitiveValue::DoubleDescending(v) => write!(f, "{v:?} (desc)"),
            PrimitiveValue::String(s) => write!(f, "{s:?}"),
            PrimitiveValue::StringDescending(s) => write!(f, "{s:?} (desc)"),
            PrimitiveValue::Timestamp(v) => write!(f, "Timestamp({v})"),
            PrimitiveValue::ArrayIndex(v) => write!(f, "ArrayIndex({v})"),
            PrimitiveValue::ColumnId(v) => write!(f, "ColumnId({v})"),
            PrimitiveValue::SystemColumnId(v) => write!(f, "SystemColumnId({v})"),
            PrimitiveValue::Object => write!(f, "{{}}"),
            PrimitiveValue::Array => write!(f, "[]"),
            PrimitiveValue::Tombstone => write!(f, "DEL"),
        }
    }
}

/// Strategies for generating key-able primitives in property tests.
#[cfg(test)]
pub(crate) mod strategies {
    use super::PrimitiveValue;
    use proptest::prelude::*;

    pub(crate) fn arb_key_primitive() -> impl Strategy<Value = PrimitiveValue> {
        prop_oneof![
            Just(PrimitiveValue::Null),
            Just(PrimitiveValue::False),
            Just(PrimitiveValue::True),
            any::<i32>().prop_map(PrimitiveValue::Int32),
            any::<i64>().prop_map(PrimitiveValue::Int64),
            any::<i64>().prop_map(PrimitiveValue::Int64Descending),
            any::<f64>()
                .prop_filter("no NaN", |v| !v.is_nan())
                .prop_map(PrimitiveValue::Double),
            any::<f64>()
                .prop_filter("no NaN", |v| !v.is_nan())
                .prop_map(PrimitiveValue::DoubleDescending),
            "[a-c\\x00]{0,4}".prop_map(PrimitiveValue::String),
            "[a-c\\x00]{0,4}".prop_map(PrimitiveValue::StringDescending),
            any::<i64>().prop_map(PrimitiveValue::ArrayIndex),
            (0i32..64).prop_map(PrimitiveValue::ColumnId),
        ]
    }
}
