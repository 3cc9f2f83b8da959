use thiserror::Error;

/// Errors raised while decoding (or encoding) the increment wire framing.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The byte stream contained an invalid UTF-8 sequence.
    #[error("invalid UTF-8 in stream (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    /// The stream ended in the middle of a multi-byte UTF-8 sequence.
    #[error("stream ended inside a UTF-8 sequence ({pending} dangling bytes)")]
    TruncatedUtf8 { pending: usize },

    /// The stream ended in the middle of a frame.
    #[error("stream ended inside a frame ({pending} bytes without a terminator)")]
    TruncatedFrame { pending: usize },

    /// A line could not be decoded as a JSON string.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A fault raised by a completion source. Terminal for the current request.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The HTTP call to the generation backend failed.
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The generation backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend's event stream could not be decoded.
    #[error("backend stream could not be decoded: {0}")]
    Frame(#[from] FrameError),

    /// A backend event was not the JSON shape we expect.
    #[error("unexpected backend event: {0}")]
    Event(serde_json::Error),

    /// Any other backend fault.
    #[error("backend failed: {0}")]
    Backend(String),
}

/// A retrieval provider could not answer. Never raised for a plain miss.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval failed: {0}")]
    Backend(String),
}
