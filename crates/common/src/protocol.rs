//! Request and response types exchanged with the `enveloped` HTTP service.
//!
//! Binary values (plaintext, serialized records) travel as standard base64
//! strings inside JSON bodies.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Encrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptRequest {
    /// Base64-encoded plaintext bytes. May encode an empty byte string.
    pub plaintext: String,
}

/// Successful response body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Base64-encoded serialized encrypted record.
    pub record: String,
}

// ---------------------------------------------------------------------------
// Decrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecryptRequest {
    /// Base64-encoded serialized encrypted record, as returned by `/encrypt`.
    pub record: String,
}

/// Successful response body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Base64-encoded recovered plaintext.
    pub plaintext: String,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"decode_error"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::EnvelopeError> for ErrorResponse {
    fn from(err: &crate::EnvelopeError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status; always `"ok"` once the server is listening.
    pub status: String,
    /// Key-wrapping provider in use: `"simplekey"` or `"awskms"`.
    pub provider: String,
}
