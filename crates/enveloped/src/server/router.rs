//! Axum router construction.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/encrypt", post(handlers::encrypt))
        .route("/decrypt", post(handlers::decrypt))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(middleware::MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use envelope::SimpleKeyProvider;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::new(Box::new(SimpleKeyProvider::new(&[0u8; 16]).unwrap()));
        build(state, middleware::DEFAULT_REQUEST_TIMEOUT)
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_route_exists() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn decrypt_requires_post() {
        let req = Request::builder()
            .uri("/decrypt")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 405);
    }

    #[tokio::test]
    async fn missing_content_type_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/encrypt")
            .body(Body::from(r#"{"plaintext":""}"#))
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 400);
    }
}
