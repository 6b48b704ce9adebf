//! Canonical CBOR encoding of [`EncryptedRecord`].
//!
//! # Format
//!
//! ```text
//! {
//!   "ciphertext":    bstr,
//!   "encrypted_key": bstr,
//!   "nonce":         bstr (12 bytes),
//!   "aad":           { tstr => tstr, ... }   ; sorted by key, must hold "key_id"
//! }
//! ```
//!
//! Keys are written in exactly that order, so encoding is deterministic.
//! Unknown top-level keys are ignored on read.
//!
//! Records written by the earlier serde-based implementation encode binary
//! fields as arrays of small integers and carry `key_id` at the top level
//! instead of inside `aad`. Both shapes are accepted on read; writing always
//! uses the canonical form.
//!
//! Legacy support is read-only: such records can be inspected and re-encoded,
//! but their 32-byte wrapped keys predate the current local wrap scheme, so
//! [`crate::SimpleKeyProvider`] rejects them with an authentication error.

use std::collections::BTreeMap;

use ciborium::value::Value;
use common::EnvelopeError;

use crate::crypto::NONCE_LEN;
use crate::record::{Aad, EncryptedRecord, KEY_ID_FIELD};

const CIPHERTEXT: &str = "ciphertext";
const ENCRYPTED_KEY: &str = "encrypted_key";
const NONCE: &str = "nonce";
const AAD: &str = "aad";

/// Encode a record as canonical CBOR bytes.
pub(crate) fn encode(record: &EncryptedRecord) -> Result<Vec<u8>, EnvelopeError> {
    let value = Value::Map(vec![
        (
            Value::Text(CIPHERTEXT.into()),
            Value::Bytes(record.ciphertext().to_vec()),
        ),
        (
            Value::Text(ENCRYPTED_KEY.into()),
            Value::Bytes(record.encrypted_key().to_vec()),
        ),
        (
            Value::Text(NONCE.into()),
            Value::Bytes(record.nonce().to_vec()),
        ),
        (Value::Text(AAD.into()), aad_value(record.aad())),
    ]);
    write(&value)
}

/// Encode just the context map; this is the AEAD associated data.
pub(crate) fn encode_aad(aad: &Aad) -> Result<Vec<u8>, EnvelopeError> {
    write(&aad_value(aad))
}

/// Decode and validate a serialized record.
pub(crate) fn decode(bytes: &[u8]) -> Result<EncryptedRecord, EnvelopeError> {
    let mut reader = bytes;
    let value: Value = ciborium::from_reader(&mut reader)
        .map_err(|e| malformed(format!("invalid CBOR: {e}")))?;
    if !reader.is_empty() {
        return Err(malformed(format!(
            "{} trailing bytes after record",
            reader.len()
        )));
    }

    let Value::Map(entries) = value else {
        return Err(malformed("top-level value is not a map"));
    };

    let mut ciphertext = None;
    let mut encrypted_key = None;
    let mut nonce = None;
    let mut aad = None;
    let mut legacy_key_id = None;

    for (key, value) in entries {
        // Non-text keys cannot name a known field; treat them as unknown.
        let Value::Text(key) = key else { continue };
        match key.as_str() {
            CIPHERTEXT => set_once(&mut ciphertext, CIPHERTEXT, binary(CIPHERTEXT, value)?)?,
            ENCRYPTED_KEY => set_once(
                &mut encrypted_key,
                ENCRYPTED_KEY,
                binary(ENCRYPTED_KEY, value)?,
            )?,
            NONCE => set_once(&mut nonce, NONCE, binary(NONCE, value)?)?,
            AAD => set_once(&mut aad, AAD, decode_aad(value)?)?,
            KEY_ID_FIELD => set_once(&mut legacy_key_id, KEY_ID_FIELD, value)?,
            _ => {}
        }
    }

    let ciphertext = ciphertext.ok_or_else(|| missing(CIPHERTEXT))?;
    let encrypted_key = encrypted_key.ok_or_else(|| missing(ENCRYPTED_KEY))?;
    let nonce_bytes = nonce.ok_or_else(|| missing(NONCE))?;
    let nonce: [u8; NONCE_LEN] = nonce_bytes.as_slice().try_into().map_err(|_| {
        malformed(format!(
            "field `{NONCE}` must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        ))
    })?;

    let aad = match (aad, legacy_key_id) {
        (Some(aad), _) => aad,
        (None, Some(key_id)) => Aad::with_key_id(text(KEY_ID_FIELD, key_id)?),
        (None, None) => return Err(missing(AAD)),
    };
    if aad.key_id().is_none() {
        return Err(malformed(format!("field `{AAD}` has no `{KEY_ID_FIELD}` entry")));
    }

    Ok(EncryptedRecord::new(ciphertext, encrypted_key, nonce, aad))
}

fn aad_value(aad: &Aad) -> Value {
    Value::Map(
        aad.iter()
            .map(|(k, v)| (Value::Text(k.to_owned()), Value::Text(v.to_owned())))
            .collect(),
    )
}

fn write(value: &Value) -> Result<Vec<u8>, EnvelopeError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| EnvelopeError::Decode(format!("CBOR encoding failed: {e}")))?;
    Ok(buf)
}

fn decode_aad(value: Value) -> Result<Aad, EnvelopeError> {
    let Value::Map(entries) = value else {
        return Err(malformed(format!("field `{AAD}` must be a map")));
    };
    let mut map = BTreeMap::new();
    for (k, v) in entries {
        let k = text("aad key", k)?;
        let v = text(&k, v)?;
        if map.contains_key(&k) {
            return Err(malformed(format!("duplicate aad entry `{k}`")));
        }
        map.insert(k, v);
    }
    Ok(Aad::from(map))
}

/// Byte string, or (legacy) an array of integers in `0..=255`.
fn binary(field: &str, value: Value) -> Result<Vec<u8>, EnvelopeError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Integer(i) => u8::try_from(i128::from(i))
                    .map_err(|_| malformed(format!("field `{field}` has a non-byte element"))),
                _ => Err(malformed(format!("field `{field}` has a non-byte element"))),
            })
            .collect(),
        _ => Err(malformed(format!("field `{field}` must be a byte string"))),
    }
}

/// Text string only. A byte string is rejected even if it holds UTF-8: the
/// AEAD associated data is rebuilt from text, so the major type must be too.
fn text(what: &str, value: Value) -> Result<String, EnvelopeError> {
    match value {
        Value::Text(s) => Ok(s),
        _ => Err(malformed(format!("`{what}` must be a text string"))),
    }
}

fn set_once<T>(slot: &mut Option<T>, field: &str, value: T) -> Result<(), EnvelopeError> {
    if slot.is_some() {
        return Err(malformed(format!("duplicate field `{field}`")));
    }
    *slot = Some(value);
    Ok(())
}

fn missing(field: &str) -> EnvelopeError {
    malformed(format!("missing field `{field}`"))
}

fn malformed(msg: impl Into<String>) -> EnvelopeError {
    EnvelopeError::Decode(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedRecord {
        EncryptedRecord::new(
            vec![0xde, 0xad, 0xbe, 0xef],
            vec![0x01; 60],
            [0x07; NONCE_LEN],
            Aad::with_key_id("simplekey"),
        )
    }

    fn to_cbor(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).unwrap();
        buf
    }

    fn entry(key: &str, value: Value) -> (Value, Value) {
        (Value::Text(key.into()), value)
    }

    fn aad_map(key_id: &str) -> Value {
        Value::Map(vec![entry("key_id", Value::Text(key_id.into()))])
    }

    fn legacy_vector() -> Vec<u8> {
        // Written by the serde_cbor-based implementation for the local-secret
        // provider: binary fields as integer arrays, top-level `key_id`.
        const HEX: &str = concat!(
            "a46a6369706865727465787498241837185d1851187c1866186c184018d518ac",
            "18b1185418c0184a0d182909186b18541847183618a4185018431847181a18f3",
            "189e186a18e218231831185d185216187418ac6d656e637279707465645f6b65",
            "799820189d18c618ae187f187d18f9187f18b518a7131859184f18ce18c41864",
            "18cf1118d918d718b818dc18e2185318e718c5186518e518b718b518c8181d18",
            "91656e6f6e63658c184c182818c818ff0b0e1866182a18e51861189618e6666b",
            "65795f69646973696d706c656b6579",
        );
        (0..HEX.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&HEX[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn round_trip() {
        let record = sample();
        let bytes = record.to_vec().unwrap();
        assert_eq!(EncryptedRecord::from_slice(&bytes).unwrap(), record);
    }

    #[test]
    fn encoding_is_deterministic() {
        let record = sample();
        assert_eq!(record.to_vec().unwrap(), record.to_vec().unwrap());
        assert_eq!(record.to_vec().unwrap(), record.clone().to_vec().unwrap());
    }

    #[test]
    fn encodes_exactly_four_fields_in_order() {
        let bytes = sample().to_vec().unwrap();
        let value: Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        let Value::Map(entries) = value else {
            panic!("expected a map")
        };
        let keys: Vec<String> = entries
            .iter()
            .map(|(k, _)| k.as_text().unwrap().to_owned())
            .collect();
        assert_eq!(keys, vec!["ciphertext", "encrypted_key", "nonce", "aad"]);
        assert!(entries[0].1.is_bytes());
        assert!(entries[3].1.is_map());
    }

    #[test]
    fn key_order_does_not_matter_on_read() {
        let value = Value::Map(vec![
            entry("aad", aad_map("simplekey")),
            entry("nonce", Value::Bytes(vec![0x07; NONCE_LEN])),
            entry("encrypted_key", Value::Bytes(vec![0x01; 60])),
            entry("ciphertext", Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef])),
        ]);
        assert_eq!(EncryptedRecord::from_slice(&to_cbor(&value)).unwrap(), sample());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let value = Value::Map(vec![
            entry("ciphertext", Value::Bytes(vec![1])),
            entry("encrypted_key", Value::Bytes(vec![2])),
            entry("nonce", Value::Bytes(vec![3; NONCE_LEN])),
            entry("aad", aad_map("simplekey")),
            entry("version", Value::Integer(2.into())),
            (Value::Integer(7.into()), Value::Null),
        ]);
        let record = EncryptedRecord::from_slice(&to_cbor(&value)).unwrap();
        assert_eq!(record.ciphertext(), &[1]);
    }

    #[test]
    fn missing_encrypted_key_is_decode_error() {
        let value = Value::Map(vec![
            entry("ciphertext", Value::Bytes(vec![1, 2, 3])),
            entry("nonce", Value::Bytes(vec![0; NONCE_LEN])),
            entry("aad", aad_map("simplekey")),
        ]);
        let err = EncryptedRecord::from_slice(&to_cbor(&value)).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode(ref m) if m.contains("encrypted_key")));
    }

    #[test]
    fn aad_without_discriminator_is_decode_error() {
        let value = Value::Map(vec![
            entry("ciphertext", Value::Bytes(vec![1])),
            entry("encrypted_key", Value::Bytes(vec![2])),
            entry("nonce", Value::Bytes(vec![3; NONCE_LEN])),
            entry(
                "aad",
                Value::Map(vec![entry("zone", Value::Text("eu".into()))]),
            ),
        ]);
        let err = EncryptedRecord::from_slice(&to_cbor(&value)).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode(_)));
    }

    #[test]
    fn wrong_shapes_are_decode_errors() {
        let cases = vec![
            // nonce as text
            Value::Map(vec![
                entry("ciphertext", Value::Bytes(vec![1])),
                entry("encrypted_key", Value::Bytes(vec![2])),
                entry("nonce", Value::Text("abc".into())),
                entry("aad", aad_map("simplekey")),
            ]),
            // nonce of the wrong length
            Value::Map(vec![
                entry("ciphertext", Value::Bytes(vec![1])),
                entry("encrypted_key", Value::Bytes(vec![2])),
                entry("nonce", Value::Bytes(vec![3; 8])),
                entry("aad", aad_map("simplekey")),
            ]),
            // aad as bytes
            Value::Map(vec![
                entry("ciphertext", Value::Bytes(vec![1])),
                entry("encrypted_key", Value::Bytes(vec![2])),
                entry("nonce", Value::Bytes(vec![3; NONCE_LEN])),
                entry("aad", Value::Bytes(vec![4])),
            ]),
            // integer array element out of byte range
            Value::Map(vec![
                entry("ciphertext", Value::Array(vec![Value::Integer(256.into())])),
                entry("encrypted_key", Value::Bytes(vec![2])),
                entry("nonce", Value::Bytes(vec![3; NONCE_LEN])),
                entry("aad", aad_map("simplekey")),
            ]),
            // top level is not a map
            Value::Array(vec![Value::Bytes(vec![1])]),
        ];
        for case in cases {
            let err = EncryptedRecord::from_slice(&to_cbor(&case)).unwrap_err();
            assert!(matches!(err, EnvelopeError::Decode(_)), "case {case:?}");
        }
    }

    #[test]
    fn duplicate_field_is_decode_error() {
        let value = Value::Map(vec![
            entry("ciphertext", Value::Bytes(vec![1])),
            entry("ciphertext", Value::Bytes(vec![9])),
            entry("encrypted_key", Value::Bytes(vec![2])),
            entry("nonce", Value::Bytes(vec![3; NONCE_LEN])),
            entry("aad", aad_map("simplekey")),
        ]);
        assert!(EncryptedRecord::from_slice(&to_cbor(&value)).is_err());
    }

    #[test]
    fn garbage_and_trailing_bytes_rejected() {
        assert!(matches!(
            EncryptedRecord::from_slice(b"Ohai!"),
            Err(EnvelopeError::Decode(_))
        ));
        assert!(matches!(
            EncryptedRecord::from_slice(&[]),
            Err(EnvelopeError::Decode(_))
        ));
        let mut bytes = sample().to_vec().unwrap();
        bytes.push(0x00);
        assert!(matches!(
            EncryptedRecord::from_slice(&bytes),
            Err(EnvelopeError::Decode(_))
        ));
    }

    #[test]
    fn byte_strings_rejected_in_aad() {
        for (key, value) in [
            (Value::Bytes(b"key_id".to_vec()), Value::Text("simplekey".into())),
            (Value::Text("key_id".into()), Value::Bytes(b"simplekey".to_vec())),
        ] {
            let value = Value::Map(vec![
                entry("ciphertext", Value::Bytes(vec![1])),
                entry("encrypted_key", Value::Bytes(vec![2])),
                entry("nonce", Value::Bytes(vec![3; NONCE_LEN])),
                entry("aad", Value::Map(vec![(key, value)])),
            ]);
            let err = EncryptedRecord::from_slice(&to_cbor(&value)).unwrap_err();
            assert!(matches!(err, EnvelopeError::Decode(_)));
        }
    }

    #[test]
    fn legacy_record_decodes() {
        let record = EncryptedRecord::from_slice(&legacy_vector()).unwrap();
        assert_eq!(record.ciphertext().len(), 36);
        assert_eq!(record.encrypted_key().len(), 32);
        assert_eq!(record.nonce()[0], 0x4c);
        assert_eq!(record.key_id(), Some("simplekey"));
        assert_eq!(record.aad().len(), 1);
    }

    #[test]
    fn legacy_record_reencodes_canonically() {
        let record = EncryptedRecord::from_slice(&legacy_vector()).unwrap();
        let canonical = record.to_vec().unwrap();
        assert_ne!(canonical, legacy_vector());
        assert_eq!(EncryptedRecord::from_slice(&canonical).unwrap(), record);
    }
}
