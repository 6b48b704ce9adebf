//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement, body limits, and response
//! compression.

use std::time::Duration;

/// Per-request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted request body. Base64 adds a third on top of the payload.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
