//! Remote-key-service provider: data keys minted and unwrapped by AWS KMS.
//!
//! The master key never leaves KMS. The context `{"key_id": <master key id>}`
//! is sent as the KMS encryption context on both `GenerateDataKey` and
//! `Decrypt`, so KMS itself enforces the binding between a wrapped key and
//! its record.

use async_trait::async_trait;
use common::EnvelopeError;
use tracing::debug;

use super::simple::SIMPLE_KEY_ID;
use super::{check_discriminator, KeyProvider, WrappedKey};
use crate::aws::{self, KeyService};
use crate::crypto::DataKey;
use crate::record::Aad;

/// Label reported by [`KeyProvider::name`].
pub const KMS_PROVIDER_NAME: &str = "awskms";

/// Explicit credentials for the KMS client, validated by [`KmsOptions`].
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("region", &self.region)
            .finish()
    }
}

/// Construction inputs for [`KmsKeyProvider`].
///
/// Either none of the credential fields are set (the SDK's default credential
/// chain is used), or `access_key_id`, `secret_access_key` and `region` are
/// all set. `session_token` is optional in the latter case.
#[derive(Clone, Default)]
pub struct KmsOptions {
    /// KMS key id, ARN, or alias of the master key. **Required.**
    pub key_id: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
}

impl std::fmt::Debug for KmsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsOptions")
            .field("key_id", &self.key_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "[REDACTED]"))
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("region", &self.region)
            .finish()
    }
}

impl KmsOptions {
    /// Options using ambient credentials.
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            ..Self::default()
        }
    }

    /// Use explicit credentials instead of the default chain.
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self.region = Some(region.into());
        self
    }

    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    /// Check the options without touching the network.
    ///
    /// Returns the explicit credentials, or `None` when the default chain
    /// should be used.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidArgument`] for a blank key id, a blank
    /// credential field, or a partially specified credential set.
    pub fn validate(&self) -> Result<Option<StaticCredentials>, EnvelopeError> {
        validate_key_id(&self.key_id)?;

        if self.access_key_id.is_none()
            && self.secret_access_key.is_none()
            && self.session_token.is_none()
            && self.region.is_none()
        {
            return Ok(None);
        }

        let session_token = match &self.session_token {
            Some(token) => Some(required("session_token", Some(token))?),
            None => None,
        };

        Ok(Some(StaticCredentials {
            access_key_id: required("access_key_id", self.access_key_id.as_ref())?,
            secret_access_key: required("secret_access_key", self.secret_access_key.as_ref())?,
            session_token,
            region: required("region", self.region.as_ref())?,
        }))
    }
}

fn validate_key_id(key_id: &str) -> Result<(), EnvelopeError> {
    if key_id.trim().is_empty() {
        return Err(EnvelopeError::InvalidArgument(
            "key ID must be a non-empty string".into(),
        ));
    }
    // The local provider's discriminator; a KMS key under this name would
    // accept local-secret records and ship their wrapped keys to KMS.
    if key_id == SIMPLE_KEY_ID {
        return Err(EnvelopeError::InvalidArgument(format!(
            "`{SIMPLE_KEY_ID}` is reserved and cannot name a KMS key"
        )));
    }
    Ok(())
}

fn required(name: &str, value: Option<&String>) -> Result<String, EnvelopeError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        Some(_) => Err(EnvelopeError::InvalidArgument(format!(
            "`{name}` must be a non-empty string"
        ))),
        None => Err(EnvelopeError::InvalidArgument(format!(
            "`{name}` is required when explicit credentials are supplied"
        ))),
    }
}

/// Provider whose master key lives in a remote key service.
#[derive(Debug)]
pub struct KmsKeyProvider<S = aws_sdk_kms::Client> {
    key_id: String,
    service: S,
}

impl KmsKeyProvider<aws_sdk_kms::Client> {
    /// Validate `options` and build an AWS KMS client for them.
    ///
    /// Validation happens before any client is built, so a bad option never
    /// reaches the network.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidArgument`] if `options` are invalid.
    pub async fn connect(options: KmsOptions) -> Result<Self, EnvelopeError> {
        let credentials = options.validate()?;
        let client = aws::kms_client(credentials.as_ref()).await;
        debug!(
            key_id = %options.key_id,
            explicit_credentials = credentials.is_some(),
            "KMS client initialised"
        );
        Ok(Self {
            key_id: options.key_id,
            service: client,
        })
    }
}

impl<S: KeyService> KmsKeyProvider<S> {
    /// Use an already-built key service.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidArgument`] for a blank key id.
    pub fn with_service(key_id: impl Into<String>, service: S) -> Result<Self, EnvelopeError> {
        let key_id = key_id.into();
        validate_key_id(&key_id)?;
        Ok(Self { key_id, service })
    }

    /// The master key this provider wraps under.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

#[async_trait]
impl<S: KeyService> KeyProvider for KmsKeyProvider<S> {
    fn name(&self) -> &'static str {
        KMS_PROVIDER_NAME
    }

    async fn wrap_key(&self) -> Result<WrappedKey, EnvelopeError> {
        let aad = Aad::with_key_id(self.key_id.as_str());
        let generated = self.service.generate_data_key(&self.key_id, &aad).await?;
        debug!(key_id = %self.key_id, "data key generated by KMS");
        Ok(WrappedKey {
            key: generated.plaintext,
            encrypted_key: generated.ciphertext,
            aad,
        })
    }

    async fn unwrap_key(&self, encrypted_key: &[u8], aad: &Aad) -> Result<DataKey, EnvelopeError> {
        check_discriminator(aad, &self.key_id)?;
        self.service.decrypt(&self.key_id, encrypted_key, aad).await
    }
}
