//! Opening a reply stream.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::json;
use tracing::debug;

use crate::error::TransportError;

/// Raw reply body, read as it arrives.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Sends one user message and hands back the reply body.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    async fn open(&self, message: &str) -> Result<ByteStream, TransportError>;
}

/// `POST {base}/api/chat` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("safecontract-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReplyTransport for HttpTransport {
    async fn open(&self, message: &str) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "message": message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_owned(),
            });
        }
        if response.content_length() == Some(0) {
            return Err(TransportError::MissingBody);
        }
        debug!(status = status.as_u16(), "reply stream opened");

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::post;
    use safecontract_core::framing::encode_frame;
    use safecontract_core::{
        CancelSignal, ChatOrchestrator, KeywordRetrieval, SimulatedSource,
    };

    use super::*;
    use crate::consumer::StreamConsumer;
    use crate::message::Conversation;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/")
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(
            HttpTransport::new("http://localhost:5222/").endpoint(),
            "http://localhost:5222/api/chat"
        );
        assert_eq!(
            HttpTransport::new("http://localhost:5222").endpoint(),
            "http://localhost:5222/api/chat"
        );
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let transport = HttpTransport::new(&serve(app).await);
        let err = match transport.open("hello").await {
            Ok(_) => panic!("expected a status error"),
            Err(e) => e,
        };
        assert!(matches!(err, TransportError::Status { code: 500, .. }));
    }

    #[tokio::test]
    async fn empty_success_is_missing_body() {
        let app = Router::new().route("/api/chat", post(|| async { StatusCode::OK }));
        let transport = HttpTransport::new(&serve(app).await);
        assert!(matches!(
            transport.open("hello").await,
            Err(TransportError::MissingBody)
        ));
    }

    #[tokio::test]
    async fn streams_a_simulated_reply_end_to_end() {
        let orchestrator = ChatOrchestrator::new(
            Arc::new(KeywordRetrieval::default()),
            Arc::new(SimulatedSource::new(std::time::Duration::ZERO)),
        );
        let app = Router::new().route(
            "/api/chat",
            post(move |axum::Json(body): axum::Json<serde_json::Value>| {
                let orchestrator = orchestrator.clone();
                async move {
                    let message = body["message"].as_str().unwrap_or_default().to_owned();
                    let frames = orchestrator
                        .respond(message, CancelSignal::never())
                        .map(|item| {
                            let increment = item.map_err(std::io::Error::other)?;
                            encode_frame(&increment).map_err(std::io::Error::other)
                        });
                    Body::from_stream(frames)
                }
            }),
        );
        let transport = HttpTransport::new(&serve(app).await);

        let conversation = Conversation::new();
        let (_, id) = conversation.begin_exchange("hello");
        let body = transport.open("hello").await.expect("open");
        let outcome = StreamConsumer::new(conversation.clone(), id)
            .run(body, &CancelSignal::never())
            .await;

        assert!(outcome.is_completed());
        assert_eq!(
            conversation.get(id).expect("message").content(),
            SimulatedSource::reply_for("hello")
        );
    }
}
