//! Tracing setup: structured JSON logs, plus OTLP span export when a
//! collector endpoint is configured.
//!
//! # Telemetry invariants
//!
//! - **No plaintext or key material** may appear in any span attribute or
//!   log field. Handlers record sizes and error codes only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
