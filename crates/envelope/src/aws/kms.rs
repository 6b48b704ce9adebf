//! [`KeyService`]: the two remote KMS operations envelope encryption needs,
//! and their implementation on top of `aws_sdk_kms::Client`.

use async_trait::async_trait;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use common::EnvelopeError;

use crate::crypto::DataKey;
use crate::record::Aad;

/// KMS error codes meaning "this key/context/ciphertext combination is not
/// valid for you", as opposed to a transient service failure.
const REJECTION_CODES: &[&str] = &[
    "AccessDeniedException",
    "DisabledException",
    "IncorrectKeyException",
    "InvalidCiphertextException",
    "InvalidGrantTokenException",
    "InvalidKeyUsageException",
    "KMSInvalidStateException",
    "NotFoundException",
];

/// A data key as returned by the remote service: plaintext plus the blob
/// only the service can decrypt.
#[derive(Debug)]
pub struct ServiceDataKey {
    pub plaintext: DataKey,
    pub ciphertext: Vec<u8>,
}

/// Remote key-management collaborator.
///
/// Both operations bind `context` to the wrapped key; the service refuses to
/// decrypt under any other context.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyService: Send + Sync {
    /// `GenerateDataKey(key_id, context)`.
    async fn generate_data_key(
        &self,
        key_id: &str,
        context: &Aad,
    ) -> Result<ServiceDataKey, EnvelopeError>;

    /// `Decrypt(ciphertext, context)`, pinned to `key_id`.
    async fn decrypt(
        &self,
        key_id: &str,
        ciphertext: &[u8],
        context: &Aad,
    ) -> Result<DataKey, EnvelopeError>;
}

#[async_trait]
impl KeyService for aws_sdk_kms::Client {
    async fn generate_data_key(
        &self,
        key_id: &str,
        context: &Aad,
    ) -> Result<ServiceDataKey, EnvelopeError> {
        let resp = aws_sdk_kms::Client::generate_data_key(self)
            .key_id(key_id)
            .key_spec(DataKeySpec::Aes256)
            .set_encryption_context(Some(context.to_context()))
            .send()
            .await
            .map_err(classify)?;

        let plaintext = resp.plaintext().ok_or_else(|| {
            EnvelopeError::Provider("KMS GenerateDataKey response contained no plaintext".into())
        })?;
        let plaintext = DataKey::from_slice(plaintext.as_ref())
            .map_err(|e| EnvelopeError::Provider(format!("KMS returned an unusable data key: {e}")))?;

        let ciphertext = resp
            .ciphertext_blob()
            .ok_or_else(|| {
                EnvelopeError::Provider(
                    "KMS GenerateDataKey response contained no ciphertext blob".into(),
                )
            })?
            .as_ref()
            .to_vec();

        Ok(ServiceDataKey {
            plaintext,
            ciphertext,
        })
    }

    async fn decrypt(
        &self,
        key_id: &str,
        ciphertext: &[u8],
        context: &Aad,
    ) -> Result<DataKey, EnvelopeError> {
        let resp = aws_sdk_kms::Client::decrypt(self)
            .key_id(key_id)
            .ciphertext_blob(Blob::new(ciphertext.to_vec()))
            .set_encryption_context(Some(context.to_context()))
            .send()
            .await
            .map_err(classify)?;

        let plaintext = resp.plaintext().ok_or_else(|| {
            EnvelopeError::Provider("KMS Decrypt response contained no plaintext".into())
        })?;
        DataKey::from_slice(plaintext.as_ref())
            .map_err(|e| EnvelopeError::Provider(format!("KMS returned an unusable data key: {e}")))
    }
}

/// Split SDK failures into authentication rejections and retryable provider
/// errors.
fn classify<E>(err: SdkError<E>) -> EnvelopeError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err.as_service_error().and_then(|e| e.code()) {
        Some(code) => classify_code(code),
        None => EnvelopeError::Provider(format!(
            "KMS request failed: {}",
            DisplayErrorContext(&err)
        )),
    }
}

fn classify_code(code: &str) -> EnvelopeError {
    if REJECTION_CODES.contains(&code) {
        EnvelopeError::Authentication(format!("KMS rejected the request: {code}"))
    } else {
        EnvelopeError::Provider(format!("KMS request failed: {code}"))
    }
}
