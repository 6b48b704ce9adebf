//! AES-256-GCM-SIV sealing and opening of payloads and wrapped keys.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant.
//! Every record still gets a fresh random nonce; the SIV construction only
//! limits the damage if the OS CSPRNG ever repeats one.

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    Aes256GcmSiv, Nonce,
};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,
}

/// Draw a fresh nonce from the OS CSPRNG.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
///
/// The output is the ciphertext followed by the [`TAG_LEN`]-byte tag, so an
/// empty plaintext still yields a non-empty ciphertext.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] on an internal AEAD error (should be
/// unreachable with a valid key).
pub fn seal(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CipherError::AeadFailure)
}

/// Decrypt and verify a ciphertext produced by [`seal`].
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key,
/// wrong nonce, wrong `aad`, or tampered data). No plaintext is returned in
/// that case.
pub fn open(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength(key.len()));
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn seal_open_round_trip() {
        let key = random_key();
        let nonce = random_nonce();
        let sealed = seal(&key, &nonce, b"123-45-6789", b"ctx").unwrap();
        assert_eq!(sealed.len(), 11 + TAG_LEN);
        let opened = open(&key, &nonce, &sealed, b"ctx").unwrap();
        assert_eq!(opened, b"123-45-6789");
    }

    #[test]
    fn empty_plaintext_yields_tag_only() {
        let key = random_key();
        let nonce = random_nonce();
        let sealed = seal(&key, &nonce, b"", b"").unwrap();
        assert_eq!(sealed.len(), TAG_LEN);
        assert!(open(&key, &nonce, &sealed, b"").unwrap().is_empty());
    }

    #[test]
    fn wrong_key_fails() {
        let nonce = random_nonce();
        let sealed = seal(&random_key(), &nonce, b"secret", b"").unwrap();
        assert!(open(&random_key(), &nonce, &sealed, b"").is_err());
    }

    #[test]
    fn wrong_aad_fails() {
        let key = random_key();
        let nonce = random_nonce();
        let sealed = seal(&key, &nonce, b"secret", b"key_id=a").unwrap();
        assert!(open(&key, &nonce, &sealed, b"key_id=b").is_err());
    }

    #[test]
    fn invalid_key_length_rejected() {
        let short_key = vec![0u8; 16];
        assert!(matches!(
            seal(&short_key, &random_nonce(), b"x", b""),
            Err(CipherError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = random_key();
        let nonce = random_nonce();
        let mut sealed = seal(&key, &nonce, b"tamper me", b"").unwrap();
        sealed[0] ^= 0xFF;
        assert!(open(&key, &nonce, &sealed, b"").is_err());
    }

    #[test]
    fn nonces_differ() {
        assert_ne!(random_nonce(), random_nonce());
    }
}
