use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use safecontract_core::orchestrator::MAX_MESSAGE_BYTES;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::error::ServerError;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Largest JSON request body written to the log verbatim.
const MAX_LOGGED_BODY: usize = 1024;

/// Request bodies are read up to this size. A `MAX_MESSAGE_BYTES` message
/// still fits once JSON-escaped (`\u0000` is six bytes).
pub const MAX_REQUEST_BYTES: usize = 6 * MAX_MESSAGE_BYTES + 1024;

/// Tag every request with a trace id and a span, log the request body and the
/// response status.
///
/// The response body passes through untouched: `/api/chat` streams, so it is
/// never buffered here. The status and latency logged are those at the time
/// the response head was produced.
pub async fn trace_middleware(req: Request, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_value = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let (parts, body) = req.into_parts();
        let req_bytes = match buffer_and_log(&parts.headers, body).await {
            Ok(bytes) => bytes,
            Err(e) => return reject(e, trace_value),
        };
        let mut req = Request::from_parts(parts, Body::from(req_bytes));
        if let Some(value) = &trace_value {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }

        let mut response = next.run(req).await;
        if let Some(value) = trace_value {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response started"
        );
        response
    }
    .instrument(span)
    .await
}

/// Collect the request body, up to [`MAX_REQUEST_BYTES`], logging small JSON
/// payloads.
async fn buffer_and_log(headers: &header::HeaderMap, body: Body) -> Result<Bytes, ServerError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let is_json = content_type.contains("application/json");

    let bytes = match Limited::new(body, MAX_REQUEST_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit = MAX_REQUEST_BYTES, "request body over limit");
            return Err(ServerError::PayloadTooLarge(format!(
                "request body exceeds {MAX_REQUEST_BYTES} bytes"
            )));
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return Err(ServerError::BadRequest("unreadable request body".into()));
        }
    };

    if is_json && bytes.len() < MAX_LOGGED_BODY {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            info!(body = %text, "request body");
        }
    } else if !bytes.is_empty() {
        info!(content_type, size = bytes.len(), "request body skipped");
    }

    Ok(bytes)
}

fn reject(error: ServerError, trace_value: Option<HeaderValue>) -> Response {
    let mut response = error.into_response();
    if let Some(value) = trace_value {
        response.headers_mut().insert(X_TRACE_ID, value);
    }
    response
}
