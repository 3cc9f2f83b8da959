//! Streaming chat route.
//!
//! `POST /api/chat` answers with an increment stream framed as described in
//! [`safecontract_core::framing`]. Each increment is written to the body as
//! soon as the orchestrator yields it. A generation fault aborts the body.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderName, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use safecontract_core::framing::{self, encode_frame};
use safecontract_core::orchestrator::MAX_MESSAGE_BYTES;
use safecontract_core::{GenerationError, IncrementStream};
use tracing::{debug, error};
use utoipa::OpenApi;

use crate::context::RequestContext;
use crate::error::ServerError;
use crate::schemas::ErrorResponse;
use crate::schemas::chat::ChatRequest;
use crate::state::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(OpenApi)]
#[openapi(paths(chat), components(schemas(ChatRequest, ErrorResponse)))]
pub struct ChatApi;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// Stream the copilot's reply to one message.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Newline-delimited JSON strings, one per increment",
            content_type = "application/x-ndjson", body = String),
        (status = 400, description = "Malformed or oversized request", body = ErrorResponse),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload?;

    if req.message.len() > MAX_MESSAGE_BYTES {
        return Err(ServerError::BadRequest(format!(
            "message too large ({} bytes); maximum is {} bytes",
            req.message.len(),
            MAX_MESSAGE_BYTES,
        )));
    }

    debug!(
        message_len = req.message.len(),
        backend = state.orchestrator.backend(),
        "chat request"
    );

    let (context, signal) = RequestContext::new();
    let increments = state.orchestrator.respond(req.message, signal);
    let body = Body::from_stream(frame_stream(increments, context));

    Ok((
        [
            (header::CONTENT_TYPE, framing::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        body,
    )
        .into_response())
}

/// Encode increments as frames. The request context travels with the body,
/// so dropping the body cancels the reply.
fn frame_stream(
    mut increments: IncrementStream,
    mut context: RequestContext,
) -> impl Stream<Item = Result<Bytes, GenerationError>> + Send + 'static {
    async_stream::stream! {
        while let Some(item) = increments.next().await {
            let frame = item.and_then(|increment| Ok(encode_frame(&increment)?));
            match frame {
                Ok(frame) => {
                    context.record_frame();
                    yield Ok(frame);
                }
                Err(e) => {
                    error!(error = %e, frames = context.frames(), "generation failed; aborting reply");
                    context.finish();
                    yield Err(e);
                    return;
                }
            }
        }
        context.finish();
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::{Request, StatusCode};
    use futures::stream;
    use http_body_util::BodyExt;
    use safecontract_core::orchestrator::BLANK_MESSAGE_NOTICE;
    use safecontract_core::{
        CancelSignal, ChatOrchestrator, CompletionSource, ConversationHistory, Increment,
        RetrievalError, RetrievalProvider, SimulatedSource,
    };
    use tower::ServiceExt;
    use tracing_test::traced_test;

    use super::*;
    use crate::config::Config;
    use crate::state::fixture;

    /// Yields one increment, then fails.
    struct FlakySource;

    impl CompletionSource for FlakySource {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn stream(&self, _history: ConversationHistory, _cancel: CancelSignal) -> IncrementStream {
            let items = vec![
                Increment::new("partial ").ok_or_else(|| GenerationError::Backend("empty".into())),
                Err(GenerationError::Backend("upstream reset".into())),
            ];
            stream::iter(items).boxed()
        }
    }

    /// Retrieval that never returns; keeps the signal it was given.
    #[derive(Default)]
    struct StalledRetrieval {
        signal: Mutex<Option<CancelSignal>>,
    }

    #[async_trait]
    impl RetrievalProvider for StalledRetrieval {
        async fn search(
            &self,
            _query: &str,
            cancel: &CancelSignal,
        ) -> Result<Option<String>, RetrievalError> {
            if let Ok(mut slot) = self.signal.lock() {
                *slot = Some(cancel.clone());
            }
            futures::future::pending().await
        }
    }

    fn post_chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    fn decode(bytes: &[u8]) -> Vec<String> {
        std::str::from_utf8(bytes)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("frame"))
            .collect()
    }

    #[tokio::test]
    async fn hello_streams_the_greeting() {
        let app = crate::routes::build(fixture::simulated());
        let response = app
            .oneshot(post_chat(r#"{"message":"hello"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], framing::CONTENT_TYPE);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let increments = decode(&bytes);
        assert!(increments.len() > 1);
        assert_eq!(increments.concat(), SimulatedSource::reply_for("hello"));
    }

    #[tokio::test]
    async fn blank_message_gets_the_notice() {
        let app = crate::routes::build(fixture::simulated());
        for body in [r#"{"message":"   "}"#, r#"{}"#] {
            let response = app.clone().oneshot(post_chat(body)).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = response.into_body().collect().await.expect("body").to_bytes();
            assert_eq!(decode(&bytes), vec![BLANK_MESSAGE_NOTICE.to_owned()]);
        }
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let app = crate::routes::build(fixture::simulated());
        let huge = "a".repeat(MAX_MESSAGE_BYTES + 1);
        let body = serde_json::json!({ "message": huge }).to_string();
        let response = app.oneshot(post_chat(&body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert!(json["error"].as_str().is_some_and(|e| e.contains("too large")));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let app = crate::routes::build(fixture::simulated());
        let response = app.oneshot(post_chat("{not json")).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[traced_test]
    async fn generation_fault_aborts_the_body() {
        let app = crate::routes::build(fixture::with_source(Arc::new(FlakySource), Config::default()));
        let response = app
            .oneshot(post_chat(r#"{"message":"go"}"#))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let first = body.frame().await.expect("frame").expect("data");
        assert_eq!(first.into_data().expect("data"), Bytes::from_static(b"\"partial \"\n"));
        assert!(body.frame().await.expect("frame").is_err());
        assert!(logs_contain("aborting reply"));
    }

    #[tokio::test]
    async fn dropping_the_body_cancels_generation() {
        let retrieval = Arc::new(StalledRetrieval::default());
        let state = Arc::new(AppState {
            config: Arc::new(Config::default()),
            orchestrator: ChatOrchestrator::new(
                retrieval.clone(),
                Arc::new(SimulatedSource::new(Duration::ZERO)),
            ),
        });
        let app = crate::routes::build(state);
        let response = app
            .oneshot(post_chat(r#"{"message":"hello"}"#))
            .await
            .expect("response");

        let mut body = response.into_body();
        // Drive the body until retrieval is waiting, then hang up.
        let poll = tokio::time::timeout(Duration::from_millis(20), body.frame()).await;
        assert!(poll.is_err());
        let signal = retrieval
            .signal
            .lock()
            .expect("lock")
            .clone()
            .expect("retrieval started");
        assert!(!signal.is_cancelled());

        drop(body);
        assert!(signal.is_cancelled());
    }
}
