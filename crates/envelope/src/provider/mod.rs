//! Key-wrapping providers: the master-key side of envelope encryption.
//!
//! A provider mints a fresh data key together with its wrapped form and the
//! authenticated context needed to unwrap it later. Two implementations:
//!
//! - [`SimpleKeyProvider`]: a fixed, caller-supplied 128-bit secret.
//! - [`KmsKeyProvider`]: a master key held by a remote key service (AWS KMS).
//!
//! Providers hold only their fixed configuration, so one instance can serve
//! any number of concurrent calls.

pub mod kms;
pub mod simple;

pub use kms::{KmsKeyProvider, KmsOptions, StaticCredentials};
pub use simple::SimpleKeyProvider;

use std::sync::Arc;

use async_trait::async_trait;
use common::EnvelopeError;

use crate::crypto::DataKey;
use crate::record::Aad;

/// A freshly minted data key, its wrapped form, and the context to store.
#[derive(Debug)]
pub struct WrappedKey {
    /// Plaintext data key; zeroed when dropped.
    pub key: DataKey,
    /// The data key wrapped under the provider's master key.
    pub encrypted_key: Vec<u8>,
    /// Authenticated context carrying the provider discriminator.
    pub aad: Aad,
}

/// Capability to wrap and unwrap data keys under a master key.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Short provider label for logs and health output.
    fn name(&self) -> &'static str;

    /// Mint a new data key and wrap it.
    async fn wrap_key(&self) -> Result<WrappedKey, EnvelopeError>;

    /// Recover the data key from its wrapped form.
    ///
    /// Implementations check the `aad` discriminator before attempting any
    /// cryptography and fail with [`EnvelopeError::Authentication`] when it
    /// does not belong to them.
    async fn unwrap_key(&self, encrypted_key: &[u8], aad: &Aad) -> Result<DataKey, EnvelopeError>;
}

#[async_trait]
impl<P: KeyProvider + ?Sized> KeyProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn wrap_key(&self) -> Result<WrappedKey, EnvelopeError> {
        (**self).wrap_key().await
    }

    async fn unwrap_key(&self, encrypted_key: &[u8], aad: &Aad) -> Result<DataKey, EnvelopeError> {
        (**self).unwrap_key(encrypted_key, aad).await
    }
}

#[async_trait]
impl<P: KeyProvider + ?Sized> KeyProvider for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn wrap_key(&self) -> Result<WrappedKey, EnvelopeError> {
        (**self).wrap_key().await
    }

    async fn unwrap_key(&self, encrypted_key: &[u8], aad: &Aad) -> Result<DataKey, EnvelopeError> {
        (**self).unwrap_key(encrypted_key, aad).await
    }
}

/// Fail fast unless `aad` names `expected` as its key id.
pub(crate) fn check_discriminator(aad: &Aad, expected: &str) -> Result<(), EnvelopeError> {
    match aad.key_id() {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(EnvelopeError::Authentication(format!(
            "record was wrapped for key `{found}`, not `{expected}`"
        ))),
        None => Err(EnvelopeError::Authentication(
            "record context has no key id".into(),
        )),
    }
}
