// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Append-only key buffer with order-preserving encoders.
//!
//! Every encoder here produces bytes whose unsigned lexicographic order
//! matches the natural order of the encoded values:
//!
//! - signed integers: big-endian with the sign bit flipped
//! - strings: `0x00` escaped as `0x00 0x01`, terminated by `0x00 0x00`
//! - doubles: sign bit flipped for positives, all bits flipped for negatives
//! - descending variants: the bitwise complement of the ascending encoding

use std::fmt;

use crate::time::HybridTime;

use super::doc_hybrid_time::{DocHybridTime, ENCODED_DOC_HT_SIZE};
use super::value_type::ValueType;
use super::{DocDbError, Result};

const SIGN_BIT_32: u32 = 1 << 31;
const SIGN_BIT_64: u64 = 1 << 63;

/// An encoded key under construction.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyBytes {
    data: Vec<u8>,
}

impl KeyBytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.data.starts_with(prefix)
    }

    pub fn append_raw(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn append_value_type(&mut self, value_type: ValueType) {
        self.data.push(value_type.as_byte());
    }

    pub fn append_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn append_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn append_u64(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn append_i32_ordered(&mut self, v: i32) {
        self.append_u32(v as u32 ^ SIGN_BIT_32);
    }

    pub fn append_i64_ordered(&mut self, v: i64) {
        self.append_u64(v as u64 ^ SIGN_BIT_64);
    }

    pub fn append_descending_i64(&mut self, v: i64) {
        self.append_u64(!(v as u64 ^ SIGN_BIT_64));
    }

    pub fn append_f64_ordered(&mut self, v: f64) {
        self.append_u64(ordered_f64_bits(v));
    }

    pub fn append_descending_f64(&mut self, v: f64) {
        self.append_u64(!ordered_f64_bits(v));
    }

    pub fn append_string_ordered(&mut self, s: &[u8]) {
        for &b in s {
            self.data.push(b);
            if b == 0 {
                self.data.push(0x01);
            }
        }
        self.data.extend_from_slice(&[0x00, 0x00]);
    }

    pub fn append_descending_string(&mut self, s: &[u8]) {
        for &b in s {
            self.data.push(!b);
            if b == 0 {
                self.data.push(!0x01);
            }
        }
        self.data.extend_from_slice(&[0xff, 0xff]);
    }

    /// Appends `'#'` followed by the encoded timestamp.
    pub fn append_doc_hybrid_time(&mut self, doc_ht: DocHybridTime) -> Result<()> {
        doc_ht.append_encoded_to(self)
    }

    /// Rewrites the trailing timestamp in place as `(ht, MAX_WRITE_ID)`.
    ///
    /// Only the last 12 bytes change; the key must already end with a
    /// well-formed timestamp suffix.
    pub fn replace_last_hybrid_time_for_seek(&mut self, ht: HybridTime) -> Result<()> {
        DocHybridTime::decode_from_end(&self.data)?;
        let encoded = DocHybridTime::for_read(ht).encode()?;
        let start = self.data.len() - ENCODED_DOC_HT_SIZE;
        self.data[start..].copy_from_slice(&encoded);
        Ok(())
    }
}

impl From<Vec<u8>> for KeyBytes {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for KeyBytes {
    fn from(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

impl From<KeyBytes> for Vec<u8> {
    fn from(key: KeyBytes) -> Self {
        key.data
    }
}

impl AsRef<[u8]> for KeyBytes {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyBytes({})", to_hex(&self.data))
    }
}

fn ordered_f64_bits(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & SIGN_BIT_64 != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT_64
    }
}

fn f64_from_ordered_bits(bits: u64) -> f64 {
    if bits & SIGN_BIT_64 != 0 {
        f64::from_bits(bits ^ SIGN_BIT_64)
    } else {
        f64::from_bits(!bits)
    }
}

/// Renders bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

// Decoders consume from the front of `input` and leave it past the decoded item.

pub(crate) fn consume_byte(input: &mut &[u8], what: &str) -> Result<u8> {
    let (&first, rest) = input
        .split_first()
        .ok_or_else(|| DocDbError::Corruption(format!("unexpected end of input reading {what}")))?;
    *input = rest;
    Ok(first)
}

pub(crate) fn consume_array<const N: usize>(input: &mut &[u8], what: &str) -> Result<[u8; N]> {
    if input.len() < N {
        return Err(DocDbError::Corruption(format!(
            "expected {N} bytes for {what}, got {}",
            input.len()
        )));
    }
    let (head, rest) = input.split_at(N);
    *input = rest;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok(out)
}

pub(crate) fn decode_u16(input: &mut &[u8]) -> Result<u16> {
    Ok(u16::from_be_bytes(consume_array(input, "u16")?))
}

pub(crate) fn decode_u32(input: &mut &[u8]) -> Result<u32> {
    Ok(u32::from_be_bytes(consume_array(input, "u32")?))
}

pub(crate) fn decode_u64(input: &mut &[u8]) -> Result<u64> {
    Ok(u64::from_be_bytes(consume_array(input, "u64")?))
}

pub(crate) fn decode_i32_ordered(input: &mut &[u8]) -> Result<i32> {
    Ok((decode_u32(input)? ^ SIGN_BIT_32) as i32)
}

pub(crate) fn decode_i64_ordered(input: &mut &[u8]) -> Result<i64> {
    Ok((decode_u64(input)? ^ SIGN_BIT_64) as i64)
}

pub(crate) fn decode_descending_i64(input: &mut &[u8]) -> Result<i64> {
    Ok((!decode_u64(input)? ^ SIGN_BIT_64) as i64)
}

pub(crate) fn decode_f64_ordered(input: &mut &[u8]) -> Result<f64> {
    Ok(f64_from_ordered_bits(decode_u64(input)?))
}

pub(crate) fn decode_descending_f64(input: &mut &[u8]) -> Result<f64> {
    Ok(f64_from_ordered_bits(!decode_u64(input)?))
}

pub(crate) fn decode_string_ordered(input: &mut &[u8]) -> Result<Vec<u8>> {
    decode_escaped(input, 0x00)
}

pub(crate) fn decode_descending_string(input: &mut &[u8]) -> Result<Vec<u8>> {
    decode_escaped(input, 0xff)
}

/// Decodes an escaped string whose bytes were XORed with `mask`.
fn decode_escaped(input: &mut &[u8], mask: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let b = consume_byte(input, "string")? ^ mask;
        if b != 0 {
            out.push(b);
            continue;
        }
        match consume_byte(input, "string escape")? ^ mask {
            0x00 => return Ok(out),
            0x01 => out.push(0),
            other => {
                return Err(DocDbError::Corruption(format!(
                    "invalid escape byte 0x{other:02x} in encoded string"
                )))
            }
        }
    }
}
