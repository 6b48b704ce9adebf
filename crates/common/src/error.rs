//! Error kinds shared by the envelope library and the HTTP service.

use thiserror::Error;

/// Every failure an envelope operation can surface.
///
/// Variants map to HTTP status codes returned by the service:
/// - [`EnvelopeError::InvalidArgument`] → 400
/// - [`EnvelopeError::Decode`] → 400
/// - [`EnvelopeError::Authentication`] → 422
/// - [`EnvelopeError::Provider`] → 502
///
/// Messages must never carry plaintext or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Malformed constructor or call input, detected before any cryptographic
    /// or network operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialized bytes do not parse into a well-formed encrypted record.
    #[error("failed to decode encrypted record: {0}")]
    Decode(String),

    /// Cryptographic verification failed: tampered ciphertext, wrong key, or
    /// an associated context that does not belong to this provider.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote key service failed for a reason other than authentication.
    /// Callers may retry.
    #[error("key provider error: {0}")]
    Provider(String),
}

impl EnvelopeError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            EnvelopeError::InvalidArgument(_) => 400,
            EnvelopeError::Decode(_) => 400,
            EnvelopeError::Authentication(_) => 422,
            EnvelopeError::Provider(_) => 502,
        }
    }

    /// Short machine-readable code used in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EnvelopeError::InvalidArgument(_) => "invalid_argument",
            EnvelopeError::Decode(_) => "decode_error",
            EnvelopeError::Authentication(_) => "authentication_failed",
            EnvelopeError::Provider(_) => "provider_error",
        }
    }

    /// `true` for failures a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnvelopeError::Provider(_))
    }
}
