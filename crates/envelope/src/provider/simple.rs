//! Local-secret provider: wraps data keys under a fixed 128-bit secret.
//!
//! # Wrap scheme
//!
//! ```text
//! wrap_nonce    = random 12 bytes
//! wrapping_key  = HMAC-SHA256(secret, "enveloper/simplekey/v1" || wrap_nonce)
//! sealed        = AES-256-GCM-SIV(wrapping_key, wrap_nonce, data_key, aad = canonical(aad))
//! encrypted_key = wrap_nonce || sealed                    ; 12 + 32 + 16 = 60 bytes
//! ```
//!
//! Every wrap derives a distinct wrapping key, and the context
//! `{"key_id": "simplekey"}` is authenticated by the wrap itself.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::EnvelopeError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use super::{check_discriminator, KeyProvider, WrappedKey};
use crate::crypto::{cipher, DataKey, KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::record::Aad;

/// Discriminator stored in the `aad` of every record this provider wraps.
pub const SIMPLE_KEY_ID: &str = "simplekey";

/// Required secret length in bytes.
pub const SECRET_LEN: usize = 16;

/// Length of the wrapped data key produced by this provider.
pub const ENCRYPTED_KEY_LEN: usize = NONCE_LEN + KEY_LEN + TAG_LEN;

const WRAP_LABEL: &[u8] = b"enveloper/simplekey/v1";

type HmacSha256 = Hmac<Sha256>;

/// Provider backed by an unprotected, caller-held 16-byte secret.
pub struct SimpleKeyProvider {
    secret: Zeroizing<[u8; SECRET_LEN]>,
}

impl SimpleKeyProvider {
    /// Build a provider from a raw secret.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidArgument`] unless `secret` is exactly
    /// [`SECRET_LEN`] bytes.
    pub fn new(secret: &[u8]) -> Result<Self, EnvelopeError> {
        let secret: [u8; SECRET_LEN] = secret.try_into().map_err(|_| {
            EnvelopeError::InvalidArgument(format!(
                "key must be {SECRET_LEN} bytes, got {}",
                secret.len()
            ))
        })?;
        Ok(Self {
            secret: Zeroizing::new(secret),
        })
    }

    /// Build a provider from a base64-encoded secret, as found in config.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidArgument`] if `encoded` is not valid
    /// base64 or does not decode to [`SECRET_LEN`] bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, EnvelopeError> {
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|_| {
            EnvelopeError::InvalidArgument("key must be a base64-encoded binary string".into())
        })?);
        Self::new(&decoded)
    }

    fn wrapping_key(
        &self,
        wrap_nonce: &[u8; NONCE_LEN],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, EnvelopeError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret[..])
            .map_err(|_| EnvelopeError::InvalidArgument("unusable key".into()))?;
        mac.update(WRAP_LABEL);
        mac.update(wrap_nonce);
        let mut derived = mac.finalize().into_bytes();

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&derived);
        derived.as_mut_slice().zeroize();
        Ok(key)
    }
}

impl std::fmt::Debug for SimpleKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SimpleKeyProvider { secret: [REDACTED] }")
    }
}

#[async_trait]
impl KeyProvider for SimpleKeyProvider {
    fn name(&self) -> &'static str {
        SIMPLE_KEY_ID
    }

    async fn wrap_key(&self) -> Result<WrappedKey, EnvelopeError> {
        let key = DataKey::generate();
        let aad = Aad::with_key_id(SIMPLE_KEY_ID);

        let wrap_nonce = cipher::random_nonce();
        let wrapping_key = self.wrapping_key(&wrap_nonce)?;
        let sealed = cipher::seal(
            &wrapping_key[..],
            &wrap_nonce,
            key.as_bytes(),
            &aad.to_canonical_bytes()?,
        )
        .map_err(|e| EnvelopeError::Provider(format!("data key wrap failed: {e}")))?;

        let mut encrypted_key = Vec::with_capacity(ENCRYPTED_KEY_LEN);
        encrypted_key.extend_from_slice(&wrap_nonce);
        encrypted_key.extend_from_slice(&sealed);

        debug!("data key wrapped under local secret");
        Ok(WrappedKey {
            key,
            encrypted_key,
            aad,
        })
    }

    async fn unwrap_key(&self, encrypted_key: &[u8], aad: &Aad) -> Result<DataKey, EnvelopeError> {
        check_discriminator(aad, SIMPLE_KEY_ID)?;

        if encrypted_key.len() != ENCRYPTED_KEY_LEN {
            return Err(EnvelopeError::Authentication(format!(
                "wrapped key must be {ENCRYPTED_KEY_LEN} bytes, got {}",
                encrypted_key.len()
            )));
        }
        let (nonce_bytes, sealed) = encrypted_key.split_at(NONCE_LEN);
        let mut wrap_nonce = [0u8; NONCE_LEN];
        wrap_nonce.copy_from_slice(nonce_bytes);

        let wrapping_key = self.wrapping_key(&wrap_nonce)?;
        let raw = Zeroizing::new(
            cipher::open(
                &wrapping_key[..],
                &wrap_nonce,
                sealed,
                &aad.to_canonical_bytes()?,
            )
            .map_err(|_| {
                EnvelopeError::Authentication("wrapped data key failed verification".into())
            })?,
        );

        DataKey::from_slice(&raw)
            .map_err(|e| EnvelopeError::Authentication(format!("unwrapped data key: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sixteen_bytes() {
        assert!(SimpleKeyProvider::new(&[0u8; 16]).is_ok());
    }

    #[test]
    fn rejects_short_and_long_keys() {
        for len in [0, 15, 17, 32] {
            let err = SimpleKeyProvider::new(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, EnvelopeError::InvalidArgument(_)), "len {len}");
        }
    }

    #[test]
    fn from_base64_validates_text() {
        assert!(SimpleKeyProvider::from_base64("AAAAAAAAAAAAAAAAAAAAAA==").is_ok());
        assert!(matches!(
            SimpleKeyProvider::from_base64("Ohai!"),
            Err(EnvelopeError::InvalidArgument(_))
        ));
        // Valid base64, but 17 bytes once decoded.
        assert!(matches!(
            SimpleKeyProvider::from_base64("AAAAAAAAAAAAAAAAAAAAAAA="),
            Err(EnvelopeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let provider = SimpleKeyProvider::new(&[0x41; 16]).unwrap();
        assert!(format!("{provider:?}").contains("REDACTED"));
    }

    #[tokio::test]
    async fn wrap_unwrap_round_trip() {
        let provider = SimpleKeyProvider::new(&[0u8; 16]).unwrap();
        let wrapped = provider.wrap_key().await.unwrap();
        assert_eq!(wrapped.encrypted_key.len(), ENCRYPTED_KEY_LEN);
        assert_eq!(wrapped.aad.key_id(), Some(SIMPLE_KEY_ID));
        let key = provider
            .unwrap_key(&wrapped.encrypted_key, &wrapped.aad)
            .await
            .unwrap();
        assert_eq!(key.as_bytes(), wrapped.key.as_bytes());
    }

    #[tokio::test]
    async fn wrapped_keys_are_unique() {
        let provider = SimpleKeyProvider::new(&[0u8; 16]).unwrap();
        let a = provider.wrap_key().await.unwrap();
        let b = provider.wrap_key().await.unwrap();
        assert_ne!(a.key.as_bytes(), b.key.as_bytes());
        assert_ne!(a.encrypted_key, b.encrypted_key);
    }

    #[tokio::test]
    async fn wrong_secret_fails_authentication() {
        let wrapped = SimpleKeyProvider::new(&[1u8; 16])
            .unwrap()
            .wrap_key()
            .await
            .unwrap();
        let other = SimpleKeyProvider::new(&[2u8; 16]).unwrap();
        let err = other
            .unwrap_key(&wrapped.encrypted_key, &wrapped.aad)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Authentication(_)));
    }

    #[tokio::test]
    async fn corrupted_wrapped_key_fails_authentication() {
        let provider = SimpleKeyProvider::new(&[0u8; 16]).unwrap();
        let wrapped = provider.wrap_key().await.unwrap();
        for i in 0..wrapped.encrypted_key.len() {
            let mut corrupted = wrapped.encrypted_key.clone();
            corrupted[i] ^= 0x01;
            let err = provider
                .unwrap_key(&corrupted, &wrapped.aad)
                .await
                .unwrap_err();
            assert!(matches!(err, EnvelopeError::Authentication(_)), "byte {i}");
        }
        let err = provider
            .unwrap_key(&wrapped.encrypted_key[1..], &wrapped.aad)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Authentication(_)));
    }

    #[tokio::test]
    async fn extra_aad_entries_fail_authentication() {
        let provider = SimpleKeyProvider::new(&[0u8; 16]).unwrap();
        let wrapped = provider.wrap_key().await.unwrap();
        let widened: Aad = [
            ("key_id".to_owned(), SIMPLE_KEY_ID.to_owned()),
            ("zone".to_owned(), "eu".to_owned()),
        ]
        .into_iter()
        .collect();
        let err = provider
            .unwrap_key(&wrapped.encrypted_key, &widened)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Authentication(_)));
    }

    #[tokio::test]
    async fn foreign_discriminator_rejected_before_crypto() {
        let provider = SimpleKeyProvider::new(&[0u8; 16]).unwrap();
        let wrapped = provider.wrap_key().await.unwrap();
        let err = provider
            .unwrap_key(&wrapped.encrypted_key, &Aad::with_key_id("alias/app"))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Authentication(ref m) if m.contains("alias/app")));
    }
}
