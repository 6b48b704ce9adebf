//! Synchronous facade over [`EnvelopeCipher`] for callers without an async
//! runtime.
//!
//! Each [`BlockingCipher`] owns a current-thread tokio runtime and drives the
//! async engine on it. Do not call these methods from inside another tokio
//! runtime; tokio panics on nested `block_on`.

use common::EnvelopeError;
use tokio::runtime::{Builder, Runtime};

use crate::engine::EnvelopeCipher;
use crate::provider::{KeyProvider, KmsKeyProvider, KmsOptions};
use crate::record::EncryptedRecord;

pub struct BlockingCipher<P> {
    cipher: EnvelopeCipher<P>,
    runtime: Runtime,
}

fn runtime() -> Result<Runtime, EnvelopeError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| EnvelopeError::Provider(format!("failed to start runtime: {e}")))
}

impl<P: KeyProvider> BlockingCipher<P> {
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Provider`] if the runtime cannot be started.
    pub fn new(provider: P) -> Result<Self, EnvelopeError> {
        Ok(Self {
            cipher: EnvelopeCipher::new(provider),
            runtime: runtime()?,
        })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedRecord, EnvelopeError> {
        self.runtime.block_on(self.cipher.encrypt(plaintext))
    }

    pub fn decrypt(&self, record: &EncryptedRecord) -> Result<Vec<u8>, EnvelopeError> {
        self.runtime.block_on(self.cipher.decrypt(record))
    }

    pub fn decrypt_slice(&self, serialized: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        self.runtime.block_on(self.cipher.decrypt_slice(serialized))
    }
}

impl BlockingCipher<KmsKeyProvider> {
    /// Validate `options`, then build a KMS-backed cipher.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidArgument`] for invalid options.
    pub fn connect(options: KmsOptions) -> Result<Self, EnvelopeError> {
        // Fail before starting a runtime or loading any AWS config.
        options.validate()?;
        let runtime = runtime()?;
        let provider = runtime.block_on(KmsKeyProvider::connect(options))?;
        Ok(Self {
            cipher: EnvelopeCipher::new(provider),
            runtime,
        })
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for BlockingCipher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingCipher")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}
