//! [`DataKey`]: the single-use plaintext key protecting one record.

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher::{CipherError, KEY_LEN};

/// Fixed-size buffer holding exactly [`KEY_LEN`] bytes of plaintext key.
///
/// Lives only for the duration of one encrypt or decrypt call. When it is
/// dropped, on success and error paths alike, the memory is overwritten with
/// zeroes. Deliberately not `Clone`.
pub struct DataKey(Box<[u8; KEY_LEN]>);

impl DataKey {
    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut buf = Box::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut buf[..]);
        Self(buf)
    }

    /// Copy key material returned by a key service or an unwrap step.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if `bytes` is not exactly
    /// [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Zeroize for DataKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for DataKey {}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("DataKey([REDACTED])")
    }
}
