// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage layout of transaction intents.
//!
//! Intents live in the same keyspace as committed data, below every doc key:
//!
//! ```text
//! intent:        0x0a ‖ sub_doc_key (no time) ‖ '#' doc_ht  =>  'x' ‖ txn_id ‖ value
//! reverse index: 0x0b ‖ txn_id ‖ '#' doc_ht                 =>  intent key
//! ```

use crate::txn::{TransactionId, TRANSACTION_ID_SIZE};

use super::doc_hybrid_time::DocHybridTime;
use super::key_bytes::{consume_array, KeyBytes};
use super::value_type::ValueType;
use super::{DocDbError, Result};

/// Lower bound of committed data; every intent and index key sorts below it.
pub const REGULAR_KEYSPACE_START: &[u8] = &[ValueType::GroupEnd.as_byte()];

/// An intent key split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedIntentKey<'a> {
    /// Encoded sub-document key without a timestamp.
    pub sub_doc_key: &'a [u8],
    pub doc_ht: DocHybridTime,
}

pub fn encode_intent_key(sub_doc_key: &[u8], doc_ht: DocHybridTime) -> Result<KeyBytes> {
    let mut key = KeyBytes::with_capacity(sub_doc_key.len() + 14);
    key.append_value_type(ValueType::IntentPrefix);
    key.append_raw(sub_doc_key);
    doc_ht.append_encoded_to(&mut key)?;
    Ok(key)
}

pub fn decode_intent_key(key: &[u8]) -> Result<DecodedIntentKey<'_>> {
    let Some((&first, rest)) = key.split_first() else {
        return Err(DocDbError::Corruption("empty intent key".to_string()));
    };
    if first != ValueType::IntentPrefix.as_byte() {
        return Err(DocDbError::Corruption(format!(
            "intent key starts with 0x{first:02x}"
        )));
    }
    let (doc_ht, sub_doc_key) = DocHybridTime::decode_from_end(rest)?;
    Ok(DecodedIntentKey {
        sub_doc_key,
        doc_ht,
    })
}

pub fn encode_intent_value(txn_id: &TransactionId, encoded_value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + TRANSACTION_ID_SIZE + encoded_value.len());
    out.push(ValueType::TransactionId.as_byte());
    out.extend_from_slice(txn_id.as_bytes());
    out.extend_from_slice(encoded_value);
    out
}

/// Splits an intent value into the owning transaction and the encoded [`Value`](super::Value).
pub fn decode_intent_value(bytes: &[u8]) -> Result<(TransactionId, &[u8])> {
    let mut input = bytes;
    let [tag] = consume_array::<1>(&mut input, "intent value tag")?;
    if tag != ValueType::TransactionId.as_byte() {
        return Err(DocDbError::Corruption(format!(
            "intent value starts with 0x{tag:02x}"
        )));
    }
    let id = consume_array::<TRANSACTION_ID_SIZE>(&mut input, "transaction id")?;
    Ok((TransactionId::from_bytes(id), input))
}

/// Prefix of every reverse index entry of `txn_id`.
pub fn transaction_index_prefix(txn_id: &TransactionId) -> KeyBytes {
    let mut key = KeyBytes::with_capacity(1 + TRANSACTION_ID_SIZE);
    key.append_value_type(ValueType::TransactionIndexPrefix);
    key.append_raw(txn_id.as_bytes());
    key
}

pub fn encode_transaction_index_key(
    txn_id: &TransactionId,
    doc_ht: DocHybridTime,
) -> Result<KeyBytes> {
    let mut key = transaction_index_prefix(txn_id);
    doc_ht.append_encoded_to(&mut key)?;
    Ok(key)
}
