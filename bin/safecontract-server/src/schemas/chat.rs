use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's message. Missing, empty and whitespace-only messages are
    /// answered with a fixed notice.
    #[serde(default)]
    pub message: String,
}
