//! Per-request composition of retrieval and completion.

use std::fmt;
use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::completion::CompletionSource;
use crate::history::{ConversationHistory, DEFAULT_PERSONA};
use crate::increment::{Increment, IncrementStream};
use crate::retrieval::RetrievalProvider;

/// Reply to a blank or whitespace-only message.
pub const BLANK_MESSAGE_NOTICE: &str = "Please provide a valid message.";

/// Largest accepted user message, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 128 * 1024;

/// Turns one user message into one increment stream.
///
/// Holds only shared, read-only collaborators, so a single instance serves
/// every request concurrently.
#[derive(Clone)]
pub struct ChatOrchestrator {
    persona: Arc<str>,
    retrieval: Arc<dyn RetrievalProvider>,
    completion: Arc<dyn CompletionSource>,
}

impl ChatOrchestrator {
    pub fn new(
        retrieval: Arc<dyn RetrievalProvider>,
        completion: Arc<dyn CompletionSource>,
    ) -> Self {
        Self {
            persona: Arc::from(DEFAULT_PERSONA),
            retrieval,
            completion,
        }
    }

    /// Replace the persona preamble.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Arc::from(persona.into());
        self
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Backend name of the injected completion source.
    pub fn backend(&self) -> &'static str {
        self.completion.name()
    }

    /// Stream the reply to `user_message`.
    ///
    /// - A blank message yields exactly [`BLANK_MESSAGE_NOTICE`]; neither
    ///   retrieval nor completion is called.
    /// - Otherwise retrieved context (if any) becomes a second system turn and
    ///   the completion source's increments are forwarded in order.
    /// - Whitespace-only increments are never forwarded on their own: they
    ///   are prefixed to the next increment, and dropped if none follows.
    /// - A completion fault ends the stream with a single `Err`.
    pub fn respond(&self, user_message: impl Into<String>, cancel: CancelSignal) -> IncrementStream {
        let user_message = user_message.into();
        if user_message.trim().is_empty() {
            debug!("blank message; replying with notice");
            return stream::iter(Increment::new(BLANK_MESSAGE_NOTICE).map(Ok)).boxed();
        }

        let this = self.clone();
        Box::pin(async_stream::stream! {
            let context = match this.retrieval.search(&user_message, &cancel).await {
                Ok(context) => context.filter(|c| !c.trim().is_empty()),
                Err(e) => {
                    warn!(error = %e, "retrieval failed; continuing without context");
                    None
                }
            };
            if cancel.is_cancelled() {
                debug!("cancelled after retrieval");
                return;
            }

            let history =
                ConversationHistory::for_request(&this.persona, context.as_deref(), &user_message);
            debug!(
                backend = this.completion.name(),
                turns = history.len(),
                with_context = context.is_some(),
                "delegating to completion source"
            );

            let mut upstream = this.completion.stream(history, cancel.clone());
            let mut held = String::new();
            let mut forwarded = 0usize;
            while !cancel.is_cancelled() {
                let Some(item) = upstream.next().await else {
                    info!(backend = this.completion.name(), increments = forwarded, "reply complete");
                    return;
                };
                match item {
                    Ok(increment) if increment.is_blank() => held.push_str(increment.as_str()),
                    Ok(increment) => {
                        held.push_str(increment.as_str());
                        if let Some(increment) = Increment::new(std::mem::take(&mut held)) {
                            forwarded += 1;
                            yield Ok(increment);
                        }
                    }
                    Err(e) => {
                        warn!(backend = this.completion.name(), error = %e, increments = forwarded, "completion source failed");
                        yield Err(e);
                        return;
                    }
                }
            }
            debug!(increments = forwarded, "reply cancelled");
        })
    }
}

impl fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("persona", &self.persona)
            .field("backend", &self.completion.name())
            .finish_non_exhaustive()
    }
}
