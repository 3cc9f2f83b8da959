use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{chat, health};
use crate::state::AppState;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(info(
    title = "safecontract-server",
    description = "SafeContract legal copilot streaming chat API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(chat::ChatApi::openapi());
    root.merge(health::HealthApi::openapi());
    root
}

/// Serves the OpenAPI document.
pub fn router() -> Router<Arc<AppState>> {
    let docs = get_docs();
    Router::new().route(
        OPENAPI_PATH,
        get(move || {
            let docs = docs.clone();
            async move { Json(docs) }
        }),
    )
}
