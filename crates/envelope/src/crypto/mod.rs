//! AES-256-GCM-SIV primitives and data-key handling.
//!
//! This module is intentionally free of AWS dependencies. It provides the
//! low-level seal/open operations used by the engine and by the local-secret
//! key wrap.

pub mod cipher;
pub mod key;

pub use cipher::{CipherError, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use key::DataKey;
