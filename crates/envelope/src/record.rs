//! [`EncryptedRecord`] and its authenticated context [`Aad`].

use std::collections::{BTreeMap, HashMap};

use common::EnvelopeError;

use crate::codec;
use crate::crypto::NONCE_LEN;

/// Name of the `aad` entry that identifies which provider (and which master
/// key) can unwrap a record.
pub const KEY_ID_FIELD: &str = "key_id";

/// Authenticated, non-secret context attached to every record.
///
/// Keys are kept sorted so the canonical encoding (and therefore the
/// associated data fed to the AEAD) does not depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aad(BTreeMap<String, String>);

impl Aad {
    /// Context carrying only the provider discriminator.
    pub fn with_key_id(key_id: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(KEY_ID_FIELD.to_owned(), key_id.into());
        Self(map)
    }

    /// The provider discriminator, if present.
    pub fn key_id(&self) -> Option<&str> {
        self.get(KEY_ID_FIELD)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy into the string map shape KMS expects as an encryption context.
    pub fn to_context(&self) -> HashMap<String, String> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Canonical CBOR bytes, used as AEAD associated data.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decode`] if CBOR encoding fails.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        codec::encode_aad(self)
    }
}

impl From<BTreeMap<String, String>> for Aad {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for Aad {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An envelope-encrypted record: the only artifact that is stored or sent.
///
/// Holds the AEAD output, the wrapped data key, the payload nonce, and the
/// authenticated context. Never holds plaintext or a plaintext key.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    ciphertext: Vec<u8>,
    encrypted_key: Vec<u8>,
    nonce: [u8; NONCE_LEN],
    aad: Aad,
}

impl EncryptedRecord {
    /// Assemble a record from its parts.
    ///
    /// Records are normally produced by
    /// [`EnvelopeCipher::encrypt`](crate::EnvelopeCipher::encrypt) or by
    /// [`EncryptedRecord::from_slice`].
    pub fn new(
        ciphertext: Vec<u8>,
        encrypted_key: Vec<u8>,
        nonce: [u8; NONCE_LEN],
        aad: Aad,
    ) -> Self {
        Self {
            ciphertext,
            encrypted_key,
            nonce,
            aad,
        }
    }

    /// AEAD output: ciphertext followed by the authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// The data key, wrapped by the provider's master key.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn aad(&self) -> &Aad {
        &self.aad
    }

    /// Shorthand for `self.aad().key_id()`.
    pub fn key_id(&self) -> Option<&str> {
        self.aad.key_id()
    }

    /// Serialize into the canonical CBOR representation.
    ///
    /// The output is deterministic: the same record always yields the same
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decode`] if CBOR encoding fails.
    pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
        codec::encode(self)
    }

    /// Parse a serialized record.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decode`] if `bytes` is not a well-formed
    /// record. Partial records are never returned.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        codec::decode(bytes)
    }
}
