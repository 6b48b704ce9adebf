//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Translate JSON/base64 bodies to and from envelope operations.
//! - Inject shared application state (`AppState`) into handlers.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
