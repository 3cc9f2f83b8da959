//! Deterministic stand-in for a real generation backend.

use std::time::Duration;

use tracing::debug;

use super::CompletionSource;
use crate::cancel::CancelSignal;
use crate::error::GenerationError;
use crate::history::ConversationHistory;
use crate::increment::{Increment, IncrementStream};

/// Delay before each simulated token.
pub const DEFAULT_TOKEN_DELAY: Duration = Duration::from_millis(50);

const TERMINATION_REPLY: &str = "Based on the uploaded contract, the **Termination Clause** states that either party may terminate the agreement with **30 days written notice**. \n\n> \"Termination for Convenience: This Agreement may be terminated by either party upon thirty (30) days prior written notice.\" [Page 4, Section 12.1]";

const GREETING_REPLY: &str = "Hello! I am your **SafeContract** Legal Copilot. How can I assist you with your document review today?";

const FALLBACK_REPLY: &str = "I am simulating a sophisticated AI response. Since this is a demo environment without active Azure OpenAI keys, I am providing a placeholder response. In a production environment, I would use RAG to query your Vector Store.";

/// Replays a canned reply chosen by keyword, one space-separated token at a
/// time with a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    token_delay: Duration,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_DELAY)
    }
}

impl SimulatedSource {
    pub fn new(token_delay: Duration) -> Self {
        Self { token_delay }
    }

    /// Canned reply for a user message (case-insensitive keyword match).
    pub fn reply_for(user_message: &str) -> &'static str {
        let lowered = user_message.to_lowercase();
        if lowered.contains("termination") {
            TERMINATION_REPLY
        } else if lowered.contains("hello") {
            GREETING_REPLY
        } else {
            FALLBACK_REPLY
        }
    }

    /// Split on spaces, keeping each space on the token before it, so the
    /// tokens concatenate back to `reply` exactly.
    pub fn tokenize(reply: &str) -> Vec<Increment> {
        reply.split_inclusive(' ').filter_map(Increment::new).collect()
    }
}

impl CompletionSource for SimulatedSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn stream(&self, history: ConversationHistory, cancel: CancelSignal) -> IncrementStream {
        let tokens = Self::tokenize(Self::reply_for(history.last_user().unwrap_or_default()));
        let delay = self.token_delay;

        Box::pin(async_stream::stream! {
            let total = tokens.len();
            for (index, token) in tokens.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    debug!(emitted = index, total, "simulated generation cancelled");
                    return;
                }
                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(emitted = index, total, "simulated generation cancelled");
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                yield Ok::<_, GenerationError>(token);
            }
        })
    }
}
