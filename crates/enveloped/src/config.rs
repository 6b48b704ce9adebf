//! Configuration loading and validation for the `enveloped` service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use envelope::KmsOptions;
use serde::Deserialize;

use crate::server::middleware::DEFAULT_REQUEST_TIMEOUT;

/// Which key-wrapping provider the service runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local 16-byte secret from `SIMPLE_KEY`.
    SimpleKey,
    /// AWS KMS master key from `KMS_KEY_ID`.
    AwsKms,
}

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Key-wrapping provider. **Required.**
    pub provider: ProviderKind,

    /// Base64-encoded 16-byte secret. Required when `provider = simplekey`.
    #[serde(default)]
    pub simple_key: Option<String>,

    /// KMS key id, ARN, or alias. Required when `provider = awskms`.
    #[serde(default)]
    pub kms_key_id: Option<String>,

    /// Explicit KMS credentials. Either all of access key, secret and region
    /// are set, or none are and the SDK's default chain is used.
    #[serde(default)]
    pub kms_access_key_id: Option<String>,
    #[serde(default)]
    pub kms_secret_access_key: Option<String>,
    #[serde(default)]
    pub kms_session_token: Option<String>,
    #[serde(default)]
    pub kms_region: Option<String>,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP collector endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}
fn default_log_level() -> String {
    "info".into()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("simple_key", &self.simple_key.as_ref().map(|_| "[REDACTED]"))
            .field("kms_key_id", &self.kms_key_id)
            .field("kms_access_key_id", &self.kms_access_key_id)
            .field(
                "kms_secret_access_key",
                &self.kms_secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "kms_session_token",
                &self.kms_session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kms_region", &self.kms_region)
            .field("listen_port", &self.listen_port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_level", &self.log_level)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .finish()
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options for [`envelope::KmsKeyProvider::connect`].
    ///
    /// Credential completeness is checked by [`KmsOptions::validate`] when
    /// the provider is built.
    pub fn kms_options(&self) -> KmsOptions {
        KmsOptions {
            key_id: self.kms_key_id.clone().unwrap_or_default(),
            access_key_id: self.kms_access_key_id.clone(),
            secret_access_key: self.kms_secret_access_key.clone(),
            session_token: self.kms_session_token.clone(),
            region: self.kms_region.clone(),
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        match self.provider {
            ProviderKind::SimpleKey => ensure_present(self.simple_key.as_deref(), "SIMPLE_KEY")?,
            ProviderKind::AwsKms => {
                ensure_present(self.kms_key_id.as_deref(), "KMS_KEY_ID")?;
                self.kms_options()
                    .validate()
                    .context("KMS_* credential settings are invalid")?;
            }
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        Ok(())
    }
}

fn ensure_present(value: Option<&str>, name: &str) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => anyhow::bail!("{name} is required and must not be empty"),
    }
}
