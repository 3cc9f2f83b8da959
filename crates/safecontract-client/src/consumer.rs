//! Applies a reply body to one assistant message.

use futures::StreamExt;
use safecontract_core::CancelSignal;
use safecontract_core::framing::FrameDecoder;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::message::Conversation;
use crate::transport::ByteStream;

/// Appended to an assistant message whose reply did not complete.
pub const INTERRUPTED_SUFFIX: &str = "\n\n[Error: Connection interrupted]";

/// How a reply ended. The message is settled in every case.
#[derive(Debug)]
pub enum Outcome {
    /// The body ended cleanly.
    Completed { increments: usize },
    /// The reply failed; the interrupted suffix was appended.
    Faulted(TransportError),
    /// The caller cancelled; the interrupted suffix was appended.
    Cancelled,
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Outcome::Faulted(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }
}

/// Owns the write side of a single assistant message for one reply.
#[derive(Debug, Clone)]
pub struct StreamConsumer {
    conversation: Conversation,
    message_id: Uuid,
}

impl StreamConsumer {
    pub fn new(conversation: Conversation, message_id: Uuid) -> Self {
        Self {
            conversation,
            message_id,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    /// Read `body` to its end, appending each decoded increment as it
    /// arrives, then settle the message.
    pub async fn run(self, mut body: ByteStream, cancel: &CancelSignal) -> Outcome {
        if let Err(e) = self.conversation.start_streaming(self.message_id) {
            warn!(message = %self.message_id, error = %e, "dropping reply for settled message");
            return Outcome::Cancelled;
        }
        let mut decoder = FrameDecoder::new();
        let mut increments = 0usize;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(message = %self.message_id, increments, "reply cancelled");
                    return self.cancel();
                }
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return self.fail(e),
            };
            let decoded = match decoder.push(&chunk) {
                Ok(decoded) => decoded,
                Err(e) => return self.fail(e.into()),
            };
            for increment in decoded {
                if let Err(e) = self.conversation.append(self.message_id, increment.as_str()) {
                    warn!(message = %self.message_id, error = %e, "dropping reply for settled message");
                    return Outcome::Cancelled;
                }
                increments += 1;
            }
        }

        if let Err(e) = decoder.finish() {
            return self.fail(e.into());
        }
        self.settle(None);
        debug!(message = %self.message_id, increments, "reply complete");
        Outcome::Completed { increments }
    }

    /// Settle the message as failed without reading a body.
    pub fn fail(&self, error: TransportError) -> Outcome {
        warn!(message = %self.message_id, error = %error, "reply interrupted");
        self.settle(Some(INTERRUPTED_SUFFIX));
        Outcome::Faulted(error)
    }

    /// Settle the message as cancelled.
    pub fn cancel(&self) -> Outcome {
        self.settle(Some(INTERRUPTED_SUFFIX));
        Outcome::Cancelled
    }

    fn settle(&self, suffix: Option<&str>) {
        if let Err(e) = self.conversation.settle(self.message_id, suffix) {
            warn!(message = %self.message_id, error = %e, "cannot settle message");
        }
    }
}
