//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - middleware layers (CORS, per-request trace id)
//! - `/api/chat`, the streaming chat route
//! - `/health`
//! - the OpenAPI document (disable with `SAFECONTRACT_ENABLE_DOCS=false`)

pub mod chat;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::Router;
use axum::http::Uri;
use axum::middleware;
use tower::ServiceBuilder;

use crate::error::ServerError;
use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", chat::router());

    if state.config.enable_docs {
        app = app.merge(doc::router());
    }

    app.fallback(not_found)
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state.config)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

async fn not_found(uri: Uri) -> ServerError {
    ServerError::NotFound(format!("no route for {}", uri.path()))
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use futures::StreamExt;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::middleware::trace::X_TRACE_ID;
    use crate::state::fixture;

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let response = build(fixture::simulated())
            .oneshot(get("/api/nope"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["error"], "no route for /api/nope");
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let response = build(fixture::simulated())
            .oneshot(get(doc::OPENAPI_PATH))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert!(json["paths"]["/api/chat"].is_object());
        assert!(json["paths"]["/health"].is_object());
    }

    #[tokio::test]
    async fn docs_can_be_disabled() {
        let config = Config {
            enable_docs: false,
            ..Config::default()
        };
        let state = fixture::with_source(
            std::sync::Arc::new(safecontract_core::SimulatedSource::default()),
            config,
        );
        let response = build(state).oneshot(get(doc::OPENAPI_PATH)).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_configured_dev_origin() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .expect("request");
        let response = build(fixture::simulated())
            .oneshot(request)
            .await
            .expect("response");
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
    }

    #[tokio::test]
    async fn trace_id_is_echoed() {
        let id = "6f1c1b5e-0a4e-4d5e-9a39-3b0a2c6f6d10";
        let request = Request::get("/health")
            .header(X_TRACE_ID, id)
            .body(Body::empty())
            .expect("request");
        let response = build(fixture::simulated())
            .oneshot(request)
            .await
            .expect("response");
        assert_eq!(response.headers()[X_TRACE_ID], id);

        let response = build(fixture::simulated())
            .oneshot(get("/health"))
            .await
            .expect("response");
        assert!(response.headers().contains_key(X_TRACE_ID));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_without_reading_it_all() {
        const CHUNK: usize = 1024 * 1024;
        let pulled = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = pulled.clone();
        let chunks = futures::stream::iter(0..64).map(move |_| {
            counter.fetch_add(CHUNK, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, std::io::Error>(axum::body::Bytes::from(vec![b' '; CHUNK]))
        });
        let request = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(chunks))
            .expect("request");

        let response = build(fixture::simulated())
            .oneshot(request)
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(response.headers().contains_key(X_TRACE_ID));
        let read = pulled.load(std::sync::atomic::Ordering::SeqCst);
        assert!(read <= trace::MAX_REQUEST_BYTES + CHUNK, "read {read} bytes");
    }

    #[tokio::test]
    async fn largest_message_fits_the_body_limit() {
        let message = "\n".repeat(safecontract_core::orchestrator::MAX_MESSAGE_BYTES);
        let body = serde_json::to_vec(&serde_json::json!({ "message": message })).expect("json");
        assert!(body.len() <= trace::MAX_REQUEST_BYTES);
    }
}
