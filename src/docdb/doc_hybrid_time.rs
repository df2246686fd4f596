// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Versioning timestamp appended to every stored key.
//!
//! Format: `'#'` ‖ `(u64::MAX - hybrid_time)` BE ‖ `(MAX_WRITE_ID - write_id)` BE u32
//!
//! Both fields are inverted so that newer versions of a key sort first under
//! the bytewise comparator. The write id only has 30 bits, so the top two bits
//! of the last word are always zero on disk.

use std::fmt;

use crate::time::{HybridTime, TimeError};

use super::key_bytes::KeyBytes;
use super::value_type::ValueType;
use super::{DocDbError, Result};

/// Largest write id; seeking "as of" a time uses it to see every write at that time.
pub const MAX_WRITE_ID: u32 = (1 << 30) - 1;

/// Size of the encoded timestamp without its `'#'` tag.
pub const ENCODED_DOC_HT_SIZE: usize = 12;

/// Size of the full key suffix including the `'#'` tag.
pub const ENCODED_DOC_HT_SUFFIX_SIZE: usize = ENCODED_DOC_HT_SIZE + 1;

/// A hybrid time plus the write order within one batch or transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocHybridTime {
    pub hybrid_time: HybridTime,
    pub write_id: u32,
}

impl DocHybridTime {
    /// Sorts last among the versions of a key; seeking to it skips a key's own versions.
    pub const MIN: DocHybridTime = DocHybridTime {
        hybrid_time: HybridTime::MIN,
        write_id: 0,
    };

    pub const MAX: DocHybridTime = DocHybridTime {
        hybrid_time: HybridTime::MAX,
        write_id: MAX_WRITE_ID,
    };

    /// Creates a timestamp, rejecting write ids wider than 30 bits.
    pub fn new(hybrid_time: HybridTime, write_id: u32) -> Result<Self> {
        if write_id > MAX_WRITE_ID {
            return Err(TimeError::WriteIdOverflow {
                write_id,
                max: MAX_WRITE_ID,
            }
            .into());
        }
        Ok(Self {
            hybrid_time,
            write_id,
        })
    }

    /// The timestamp to seek with when reading as of `ht`.
    pub const fn for_read(ht: HybridTime) -> Self {
        Self {
            hybrid_time: ht,
            write_id: MAX_WRITE_ID,
        }
    }

    pub fn encode(&self) -> Result<[u8; ENCODED_DOC_HT_SIZE]> {
        if self.write_id > MAX_WRITE_ID {
            return Err(TimeError::WriteIdOverflow {
                write_id: self.write_id,
                max: MAX_WRITE_ID,
            }
            .into());
        }
        let mut out = [0u8; ENCODED_DOC_HT_SIZE];
        out[..8].copy_from_slice(&(u64::MAX - self.hybrid_time.to_raw()).to_be_bytes());
        out[8..].copy_from_slice(&(MAX_WRITE_ID - self.write_id).to_be_bytes());
        Ok(out)
    }

    /// Appends `'#'` and the encoded timestamp.
    pub fn append_encoded_to(&self, key: &mut KeyBytes) -> Result<()> {
        let encoded = self.encode()?;
        key.append_value_type(ValueType::HybridTime);
        key.append_raw(&encoded);
        Ok(())
    }

    pub fn encoded_suffix(&self) -> Result<Vec<u8>> {
        let mut key = KeyBytes::with_capacity(ENCODED_DOC_HT_SUFFIX_SIZE);
        self.append_encoded_to(&mut key)?;
        Ok(key.into_vec())
    }

    /// Decodes the 12 bytes that follow a `'#'` tag.
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        if encoded.len() != ENCODED_DOC_HT_SIZE {
            return Err(DocDbError::Corruption(format!(
                "encoded doc hybrid time must be {ENCODED_DOC_HT_SIZE} bytes, got {}",
                encoded.len()
            )));
        }
        let mut ht_bytes = [0u8; 8];
        ht_bytes.copy_from_slice(&encoded[..8]);
        let mut write_id_bytes = [0u8; 4];
        write_id_bytes.copy_from_slice(&encoded[8..]);

        let inverted_write_id = u32::from_be_bytes(write_id_bytes);
        if inverted_write_id > MAX_WRITE_ID {
            return Err(DocDbError::Corruption(format!(
                "reserved bits set in encoded write id 0x{inverted_write_id:08x}"
            )));
        }

        Ok(Self {
            hybrid_time: HybridTime::from_raw(u64::MAX - u64::from_be_bytes(ht_bytes)),
            write_id: MAX_WRITE_ID - inverted_write_id,
        })
    }

    /// Decodes the timestamp suffix of `key`, returning it with the key prefix in front of it.
    pub fn decode_from_end(key: &[u8]) -> Result<(Self, &[u8])> {
        if key.len() < ENCODED_DOC_HT_SUFFIX_SIZE {
            return Err(DocDbError::Corruption(format!(
                "key of {} bytes is too short to end with a doc hybrid time",
                key.len()
            )));
        }
        let tag_pos = key.len() - ENCODED_DOC_HT_SUFFIX_SIZE;
        if key[tag_pos] != ValueType::HybridTime.as_byte() {
            return Err(DocDbError::Corruption(format!(
                "expected hybrid time tag at offset {tag_pos}, found 0x{:02x}",
                key[tag_pos]
            )));
        }
        let dht = Self::decode(&key[tag_pos + 1..])?;
        Ok((dht, &key[..tag_pos]))
    }
}

impl fmt::Display for DocHybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.write_id == 0 {
            write!(f, "{}", self.hybrid_time)
        } else {
            write!(f, "{} w: {}", self.hybrid_time, self.write_id)
        }
    }
}
