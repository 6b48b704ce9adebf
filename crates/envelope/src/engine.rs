//! [`EnvelopeCipher`]: binds a key-wrapping provider to payload encryption.

use common::EnvelopeError;
use tracing::{debug, instrument};

use crate::crypto::{cipher, CipherError};
use crate::provider::{KeyProvider, WrappedKey};
use crate::record::EncryptedRecord;

/// Envelope encryption engine over a [`KeyProvider`].
///
/// Stateless apart from the provider: share one instance (e.g. behind an
/// `Arc`) across tasks and threads.
#[derive(Debug)]
pub struct EnvelopeCipher<P> {
    provider: P,
}

impl<P: KeyProvider> EnvelopeCipher<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Encrypt `plaintext` under a fresh data key.
    ///
    /// The data key is wrapped by the provider and zeroed before this call
    /// returns. The record's context is bound to the ciphertext as AEAD
    /// associated data.
    ///
    /// # Errors
    ///
    /// Propagates provider failures ([`EnvelopeError::Provider`] for the
    /// remote service). Returns [`EnvelopeError::InvalidArgument`] if the
    /// plaintext exceeds the AEAD length limit.
    #[instrument(skip_all, fields(provider = self.provider.name(), plaintext_len = plaintext.len()))]
    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedRecord, EnvelopeError> {
        let WrappedKey {
            key,
            encrypted_key,
            aad,
        } = self.provider.wrap_key().await?;

        let nonce = cipher::random_nonce();
        let ciphertext = cipher::seal(key.as_bytes(), &nonce, plaintext, &aad.to_canonical_bytes()?)
            .map_err(seal_failure)?;
        drop(key);

        debug!(ciphertext_len = ciphertext.len(), "record sealed");
        Ok(EncryptedRecord::new(ciphertext, encrypted_key, nonce, aad))
    }

    /// Recover the plaintext of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Authentication`] if the record belongs to a
    /// different provider or key, or if any part of it was altered. Never
    /// returns partial plaintext.
    #[instrument(skip_all, fields(provider = self.provider.name(), ciphertext_len = record.ciphertext().len()))]
    pub async fn decrypt(&self, record: &EncryptedRecord) -> Result<Vec<u8>, EnvelopeError> {
        let key = self
            .provider
            .unwrap_key(record.encrypted_key(), record.aad())
            .await?;

        let plaintext = cipher::open(
            key.as_bytes(),
            record.nonce(),
            record.ciphertext(),
            &record.aad().to_canonical_bytes()?,
        )
        .map_err(|_| EnvelopeError::Authentication("ciphertext failed verification".into()))?;

        debug!("record opened");
        Ok(plaintext)
    }

    /// Deserialize and decrypt in one step.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decode`] for malformed bytes, otherwise as
    /// [`EnvelopeCipher::decrypt`].
    pub async fn decrypt_slice(&self, serialized: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let record = EncryptedRecord::from_slice(serialized)?;
        self.decrypt(&record).await
    }
}

/// A payload seal fails only for plaintexts beyond the AEAD length limit
/// (2^36 bytes); the key is always [`crate::crypto::KEY_LEN`] bytes. Retrying
/// cannot help, so this is never a provider error.
fn seal_failure(err: CipherError) -> EnvelopeError {
    EnvelopeError::InvalidArgument(format!("plaintext cannot be sealed: {err}"))
}
