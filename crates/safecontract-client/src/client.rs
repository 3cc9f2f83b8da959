use std::sync::Arc;

use safecontract_core::CancelSignal;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::consumer::{Outcome, StreamConsumer};
use crate::message::Conversation;
use crate::transport::{HttpTransport, ReplyTransport};

/// Result of one `send_message` call.
#[derive(Debug)]
pub struct Settlement {
    /// The assistant message the reply was written to.
    pub message_id: Uuid,
    pub outcome: Outcome,
}

/// Sends user messages and streams the replies into a shared
/// [`Conversation`].
///
/// Calls may overlap; each one owns its assistant message and its
/// cancellation scope.
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn ReplyTransport>,
    conversation: Conversation,
}

impl ChatClient {
    /// Client for the API at `base_url`; requests go to `{base_url}/api/chat`.
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(base_url)))
    }

    pub fn with_transport(transport: Arc<dyn ReplyTransport>) -> Self {
        Self {
            transport,
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_loading(&self) -> bool {
        self.conversation.is_loading()
    }

    pub async fn send_message(&self, text: impl Into<String>) -> Settlement {
        self.send_message_with_cancel(text, CancelSignal::never())
            .await
    }

    /// Record `text` and a pending reply, then stream the reply until it
    /// completes, fails, or `cancel` fires. The reply is settled on return.
    pub async fn send_message_with_cancel(
        &self,
        text: impl Into<String>,
        cancel: CancelSignal,
    ) -> Settlement {
        let text = text.into();
        let (_, message_id) = self.conversation.begin_exchange(text.clone());
        let consumer = StreamConsumer::new(self.conversation.clone(), message_id);
        let span = info_span!("reply", message = %message_id);

        let outcome = async {
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                opened = self.transport.open(&text) => Some(opened),
            };
            match opened {
                None => consumer.cancel(),
                Some(Err(e)) => consumer.fail(e),
                Some(Ok(body)) => consumer.run(body, &cancel).await,
            }
        }
        .instrument(span)
        .await;

        Settlement {
            message_id,
            outcome,
        }
    }
}
