//! Envelope encryption: payloads sealed under single-use data keys, data
//! keys wrapped under a master key held by a pluggable provider.
//!
//! # Record lifecycle
//!
//! 1. [`EnvelopeCipher::encrypt`] asks its [`KeyProvider`] for a fresh data
//!    key plus its wrapped form and authenticated context.
//! 2. The plaintext is sealed with AES-256-GCM-SIV under that key and a fresh
//!    random nonce, with the context as associated data.
//! 3. The data key is zeroed; the result is an [`EncryptedRecord`], which
//!    [`EncryptedRecord::to_vec`] turns into canonical CBOR bytes.
//! 4. [`EnvelopeCipher::decrypt`] reverses this. The provider refuses any
//!    record whose context names a different provider or master key.
//!
//! # Security invariants
//!
//! - Plaintext and plaintext data keys are never logged, never stored in a
//!   record, and never included in error messages.
//! - Tampering with ciphertext, nonce, wrapped key, or context fails with
//!   [`EnvelopeError::Authentication`]; no partial plaintext is returned.

pub mod aws;
pub mod blocking;
mod codec;
pub mod crypto;
pub mod engine;
pub mod provider;
pub mod record;

pub use blocking::BlockingCipher;
pub use common::EnvelopeError;
pub use engine::EnvelopeCipher;
pub use provider::{KeyProvider, KmsKeyProvider, KmsOptions, SimpleKeyProvider, WrappedKey};
pub use record::{Aad, EncryptedRecord};
