// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Type tags that prefix every encoded key component and stored value.
//!
//! The byte values are part of the on-disk format and their relative order
//! determines key order, so they must never change.

use std::fmt;

use super::{DocDbError, Result};

/// One-byte type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    LowestByte = 0x00,
    /// Prefix of every transaction intent key.
    IntentPrefix = 0x0a,
    /// Prefix of the reverse index from a transaction to its intents.
    TransactionIndexPrefix = 0x0b,
    /// Ends a group of doc key components.
    GroupEnd = b'!',
    /// Precedes an encoded `DocHybridTime` suffix.
    HybridTime = b'#',
    Null = b'$',
    ArrayIndex = b'A',
    Double = b'D',
    DoubleDescending = b'd',
    False = b'F',
    /// Precedes the 16-bit hash of a hash-partitioned doc key.
    UInt16Hash = b'G',
    Int32 = b'H',
    Int64 = b'I',
    Int64Descending = b'i',
    SystemColumnId = b'J',
    ColumnId = b'K',
    String = b'S',
    StringDescending = b's',
    True = b'T',
    Timestamp = b'U',
    Tombstone = b'X',
    Array = b'[',
    Object = b'{',
    Ttl = b't',
    TransactionId = b'x',
    MaxByte = 0xff,
}

impl ValueType {
    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns true for the types allowed as doc key components and sub-keys.
    pub fn is_key_type(self) -> bool {
        matches!(
            self,
            ValueType::Null
                | ValueType::False
                | ValueType::True
                | ValueType::Int32
                | ValueType::Int64
                | ValueType::Int64Descending
                | ValueType::Double
                | ValueType::DoubleDescending
                | ValueType::String
                | ValueType::StringDescending
                | ValueType::Timestamp
                | ValueType::ArrayIndex
                | ValueType::ColumnId
                | ValueType::SystemColumnId
        )
    }
}

// Ordered by tag byte, which is not the declaration order.
impl Ord for ValueType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_byte().cmp(&other.as_byte())
    }
}

impl PartialOrd for ValueType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<u8> for ValueType {
    type Error = DocDbError;

    fn try_from(byte: u8) -> Result<Self> {
        let value_type = match byte {
            0x00 => ValueType::LowestByte,
            0x0a => ValueType::IntentPrefix,
            0x0b => ValueType::TransactionIndexPrefix,
            b'!' => ValueType::GroupEnd,
            b'#' => ValueType::HybridTime,
            b'$' => ValueType::Null,
            b'A' => ValueType::ArrayIndex,
            b'D' => ValueType::Double,
            b'd' => ValueType::DoubleDescending,
            b'F' => ValueType::False,
            b'G' => ValueType::UInt16Hash,
            b'H' => ValueType::Int32,
            b'I' => ValueType::Int64,
            b'i' => ValueType::Int64Descending,
            b'J' => ValueType::SystemColumnId,
            b'K' => ValueType::ColumnId,
            b'S' => ValueType::String,
            b's' => ValueType::StringDescending,
            b'T' => ValueType::True,
            b'U' => ValueType::Timestamp,
            b'X' => ValueType::Tombstone,
            b'[' => ValueType::Array,
            b'{' => ValueType::Object,
            b't' => ValueType::Ttl,
            b'x' => ValueType::TransactionId,
            0xff => ValueType::MaxByte,
            other => {
                return Err(DocDbError::Corruption(format!(
                    "invalid value type byte 0x{other:02x}"
                )))
            }
        };
        Ok(value_type)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
