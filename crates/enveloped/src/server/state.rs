//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use envelope::{EnvelopeCipher, KeyProvider, KmsKeyProvider, SimpleKeyProvider};
use tracing::info;

use crate::config::{Config, ProviderKind};

/// Engine type behind the service, whichever provider was configured.
pub type SharedCipher = Arc<EnvelopeCipher<Box<dyn KeyProvider>>>;

/// Application state shared across all request handlers.
///
/// Cloning is an `Arc` bump; the engine itself is stateless.
#[derive(Clone)]
pub struct AppState {
    pub cipher: SharedCipher,
}

impl AppState {
    pub fn new(provider: Box<dyn KeyProvider>) -> Self {
        Self {
            cipher: Arc::new(EnvelopeCipher::new(provider)),
        }
    }

    /// Build the configured provider and wrap it in an engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret or KMS options are rejected.
    pub async fn from_config(cfg: &Config) -> Result<Self> {
        let provider: Box<dyn KeyProvider> = match cfg.provider {
            ProviderKind::SimpleKey => {
                let secret = cfg.simple_key.as_deref().unwrap_or_default();
                Box::new(SimpleKeyProvider::from_base64(secret).context("SIMPLE_KEY is invalid")?)
            }
            ProviderKind::AwsKms => Box::new(
                KmsKeyProvider::connect(cfg.kms_options())
                    .await
                    .context("failed to set up KMS provider")?,
            ),
        };
        info!(provider = provider.name(), "key provider ready");
        Ok(Self::new(provider))
    }
}
