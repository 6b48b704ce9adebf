//! Axum request handlers for all service endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, ErrorResponse,
    HealthResponse,
};
use common::EnvelopeError;
use tracing::{debug, warn};

use super::state::AppState;

/// Handler failure rendered as an [`ErrorResponse`] with the status mapped
/// from the error kind.
#[derive(Debug)]
pub struct ApiError(EnvelopeError);

impl From<EnvelopeError> for ApiError {
    fn from(err: EnvelopeError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(EnvelopeError::InvalidArgument(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!(code = self.0.code(), status = status.as_u16(), "request failed");
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

/// `POST /encrypt`: seal base64 `plaintext` into a base64 serialized record.
pub async fn encrypt(
    State(state): State<AppState>,
    body: Result<Json<EncryptRequest>, JsonRejection>,
) -> Result<Json<EncryptResponse>, ApiError> {
    let Json(req) = body?;
    let plaintext = decode_field("plaintext", &req.plaintext)?;

    let record = state.cipher.encrypt(&plaintext).await?;
    let serialized = record.to_vec()?;
    debug!(record_len = serialized.len(), "encrypted");

    Ok(Json(EncryptResponse {
        record: STANDARD.encode(serialized),
    }))
}

/// `POST /decrypt`: recover base64 `plaintext` from a base64 serialized record.
pub async fn decrypt(
    State(state): State<AppState>,
    body: Result<Json<DecryptRequest>, JsonRejection>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let Json(req) = body?;
    let serialized = decode_field("record", &req.record)?;

    let plaintext = state.cipher.decrypt_slice(&serialized).await?;
    debug!(plaintext_len = plaintext.len(), "decrypted");

    Ok(Json(DecryptResponse {
        plaintext: STANDARD.encode(plaintext),
    }))
}

/// `GET /health`: liveness check naming the active provider.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        provider: state.cipher.provider().name().into(),
    })
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, EnvelopeError> {
    STANDARD
        .decode(value)
        .map_err(|e| EnvelopeError::InvalidArgument(format!("`{field}` is not valid base64: {e}")))
}
