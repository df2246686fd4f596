// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Stored values with optional TTL.
//!
//! Format: `['t' ttl_millis:u64 BE] primitive_value_encoding`

use std::time::Duration;

use crate::time::{add_physical_time_to_hybrid_time, HybridTime};

use super::key_bytes::consume_array;
use super::primitive_value::PrimitiveValue;
use super::value_type::ValueType;
use super::{DocDbError, Result};

/// A value stored at one version of a sub-document key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    primitive: PrimitiveValue,
    /// `None` never expires. `Some(Duration::ZERO)` expires right after the write.
    ttl: Option<Duration>,
}

impl Value {
    #[inline]
    pub fn new(primitive: PrimitiveValue) -> Self {
        Self {
            primitive,
            ttl: None,
        }
    }

    /// A value that expires `ttl` after its write time.
    ///
    /// TTLs are stored in whole milliseconds, so a fractional millisecond is
    /// rounded up. A positive TTL never becomes zero.
    pub fn with_ttl(primitive: PrimitiveValue, ttl: Duration) -> Self {
        Self {
            primitive,
            ttl: Some(round_up_to_millis(ttl)),
        }
    }

    pub fn tombstone() -> Self {
        Self::new(PrimitiveValue::Tombstone)
    }

    #[inline]
    pub fn primitive(&self) -> &PrimitiveValue {
        &self.primitive
    }

    pub fn into_primitive(self) -> PrimitiveValue {
        self.primitive
    }

    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.primitive.is_tombstone()
    }

    /// The instant after which a value written at `write_ht` reads as deleted.
    pub fn expiry(&self, write_ht: HybridTime) -> Option<HybridTime> {
        self.ttl
            .map(|ttl| add_physical_time_to_hybrid_time(write_ht, ttl))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.append_encoded_to(&mut out);
        out
    }

    pub fn append_encoded_to(&self, out: &mut Vec<u8>) {
        if let Some(ttl) = self.ttl {
            out.push(ValueType::Ttl.as_byte());
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            out.extend_from_slice(&millis.to_be_bytes());
        }
        self.primitive.append_value_encoding(out);
    }

    /// Strips a leading TTL field from `input`.
    ///
    /// Returns `None` when the value carries no TTL.
    pub fn decode_ttl(input: &mut &[u8]) -> Result<Option<Duration>> {
        if input.first() != Some(&ValueType::Ttl.as_byte()) {
            return Ok(None);
        }
        *input = &input[1..];
        let millis = u64::from_be_bytes(consume_array(input, "ttl")?);
        Ok(Some(Duration::from_millis(millis)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(DocDbError::Corruption(
                "cannot decode a value from an empty slice".to_string(),
            ));
        }
        let mut input = bytes;
        let ttl = Self::decode_ttl(&mut input)?;
        let primitive = PrimitiveValue::decode_value(input)?;
        Ok(Self { primitive, ttl })
    }
}

fn round_up_to_millis(ttl: Duration) -> Duration {
    let mut millis = ttl.as_millis();
    if ttl.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

impl From<PrimitiveValue> for Value {
    fn from(primitive: PrimitiveValue) -> Self {
        Self::new(primitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_without_ttl() {
        let value = Value::new(PrimitiveValue::string("v"));
        let encoded = value.encode();
        assert_eq!(encoded[0], b'S');
        assert_eq!(Value::decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_roundtrip_with_ttl() {
        let value = Value::with_ttl(PrimitiveValue::Int64(3), Duration::from_millis(50));
        let encoded = value.encode();
        assert_eq!(encoded[0], b't');
        assert_eq!(&encoded[1..9], &50u64.to_be_bytes());
        assert_eq!(Value::decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_decode_ttl_leaves_payload() {
        let encoded = Value::with_ttl(PrimitiveValue::Null, Duration::from_secs(1)).encode();
        let mut input = encoded.as_slice();
        assert_eq!(
            Value::decode_ttl(&mut input).unwrap(),
            Some(Duration::from_secs(1))
        );
        assert_eq!(input, &[b'$']);

        let plain = Value::new(PrimitiveValue::Null).encode();
        let mut input = plain.as_slice();
        assert_eq!(Value::decode_ttl(&mut input).unwrap(), None);
        assert_eq!(input, plain.as_slice());
    }

    #[test]
    fn test_zero_ttl_is_distinct_from_none() {
        let zero = Value::with_ttl(PrimitiveValue::True, Duration::ZERO);
        let decoded = Value::decode(&zero.encode()).unwrap();
        assert_eq!(decoded.ttl(), Some(Duration::ZERO));

        let write_ht = HybridTime::from_micros(10);
        assert_eq!(decoded.expiry(write_ht), Some(write_ht));
        assert_eq!(Value::new(PrimitiveValue::True).expiry(write_ht), None);
    }

    #[test]
    fn test_sub_millisecond_ttl_rounds_up() {
        let value = Value::with_ttl(PrimitiveValue::Int64(1), Duration::from_micros(500));
        assert_eq!(value.ttl(), Some(Duration::from_millis(1)));
        let decoded = Value::decode(&value.encode()).unwrap();
        assert_eq!(decoded, value);

        let write_ht = HybridTime::from_micros(10_000);
        assert!(decoded.expiry(write_ht).unwrap() > HybridTime::from_micros(10_400));

        let exact = Value::with_ttl(PrimitiveValue::Null, Duration::from_millis(7));
        assert_eq!(exact.ttl(), Some(Duration::from_millis(7)));
        let fraction = Value::with_ttl(PrimitiveValue::Null, Duration::new(2, 1));
        assert_eq!(fraction.ttl(), Some(Duration::from_millis(2_001)));
    }

    #[test]
    fn test_expiry() {
        let value = Value::with_ttl(PrimitiveValue::Null, Duration::from_millis(50));
        let expiry = value.expiry(HybridTime::from_micros(100_000)).unwrap();
        assert_eq!(expiry, HybridTime::from_micros(150_000));
    }

    #[test]
    fn test_truncated_ttl_is_corruption() {
        let mut input: &[u8] = &[b't', 0, 0, 1];
        assert!(Value::decode_ttl(&mut input).unwrap_err().is_corruption());
        assert!(Value::decode(&[]).unwrap_err().is_corruption());
    }

    #[test]
    fn test_tombstone() {
        let tombstone = Value::tombstone();
        assert!(tombstone.is_tombstone());
        assert_eq!(tombstone.encode(), vec![b'X']);
    }
}
