use safecontract_core::FrameError;
use thiserror::Error;
use uuid::Uuid;

/// Any failure observed while receiving a reply. Terminal for that reply.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("request failed: {code} {reason}")]
    Status { code: u16, reason: String },

    /// Connection, reset, or body read failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server accepted the request but sent no reply body.
    #[error("response has no body")]
    MissingBody,

    /// The body did not follow the increment framing.
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
}

/// Rejected conversation mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown message {0}")]
    UnknownMessage(Uuid),

    #[error("message {0} is already settled")]
    AlreadySettled(Uuid),

    #[error("message {0} is not an assistant message")]
    NotAssistant(Uuid),
}
