//! Message state and the owned conversation store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use safecontract_core::Role;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StateError;

const EVENT_CAPACITY: usize = 1024;

/// Lifecycle of a message: `Pending -> Streaming -> Settled`.
///
/// User messages are created settled. `Settled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePhase {
    /// Created; no reply body yet.
    Pending,
    /// The reply body is open. Increments may or may not have arrived.
    Streaming,
    /// Completed, faulted, or cancelled.
    Settled,
}

/// One entry of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    id: Uuid,
    role: Role,
    content: String,
    phase: MessagePhase,
}

impl ChatMessage {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn phase(&self) -> MessagePhase {
        self.phase
    }

    /// `true` until the message settles.
    pub fn is_streaming(&self) -> bool {
        self.phase != MessagePhase::Settled
    }
}

/// Change notification for observers of a [`Conversation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    Added { id: Uuid, role: Role },
    Appended { id: Uuid, text: String },
    Settled { id: Uuid },
}

#[derive(Debug, Default)]
struct Inner {
    messages: Vec<ChatMessage>,
    index: HashMap<Uuid, usize>,
}

impl Inner {
    fn insert(&mut self, role: Role, content: String, phase: MessagePhase) -> Uuid {
        let id = Uuid::new_v4();
        self.index.insert(id, self.messages.len());
        self.messages.push(ChatMessage {
            id,
            role,
            content,
            phase,
        });
        id
    }

    fn assistant_mut(&mut self, id: Uuid) -> Result<&mut ChatMessage, StateError> {
        let slot = *self.index.get(&id).ok_or(StateError::UnknownMessage(id))?;
        let message = &mut self.messages[slot];
        if message.role != Role::Assistant {
            return Err(StateError::NotAssistant(id));
        }
        Ok(message)
    }
}

/// Ordered messages keyed by id, shared between the senders and a UI.
///
/// Mutation goes through [`append`](Self::append) and
/// [`settle`](Self::settle) only; each call is applied atomically and its
/// event is published in the same order as the mutation.
#[derive(Debug, Clone)]
pub struct Conversation {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<ConversationEvent>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ConversationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Observe changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// Add a settled user message.
    pub fn push_user(&self, content: impl Into<String>) -> Uuid {
        let mut inner = self.lock();
        let id = inner.insert(Role::User, content.into(), MessagePhase::Settled);
        self.publish(ConversationEvent::Added { id, role: Role::User });
        id
    }

    /// Add an empty, pending assistant message.
    pub fn push_assistant_pending(&self) -> Uuid {
        let mut inner = self.lock();
        let id = inner.insert(Role::Assistant, String::new(), MessagePhase::Pending);
        self.publish(ConversationEvent::Added {
            id,
            role: Role::Assistant,
        });
        id
    }

    /// Add a user message and its pending reply as adjacent entries.
    /// Returns `(user_id, assistant_id)`.
    pub fn begin_exchange(&self, content: impl Into<String>) -> (Uuid, Uuid) {
        let mut inner = self.lock();
        let user = inner.insert(Role::User, content.into(), MessagePhase::Settled);
        let assistant = inner.insert(Role::Assistant, String::new(), MessagePhase::Pending);
        self.publish(ConversationEvent::Added {
            id: user,
            role: Role::User,
        });
        self.publish(ConversationEvent::Added {
            id: assistant,
            role: Role::Assistant,
        });
        (user, assistant)
    }

    /// Mark a pending assistant message as streaming once its reply body
    /// opens. A no-op for a message that is already streaming.
    pub fn start_streaming(&self, id: Uuid) -> Result<(), StateError> {
        let mut inner = self.lock();
        let message = inner.assistant_mut(id)?;
        match message.phase {
            MessagePhase::Settled => Err(StateError::AlreadySettled(id)),
            _ => {
                message.phase = MessagePhase::Streaming;
                Ok(())
            }
        }
    }

    /// Append text to an unsettled assistant message.
    pub fn append(&self, id: Uuid, text: &str) -> Result<(), StateError> {
        let mut inner = self.lock();
        let message = inner.assistant_mut(id)?;
        if message.phase == MessagePhase::Settled {
            return Err(StateError::AlreadySettled(id));
        }
        message.content.push_str(text);
        message.phase = MessagePhase::Streaming;
        self.publish(ConversationEvent::Appended {
            id,
            text: text.to_owned(),
        });
        Ok(())
    }

    /// Settle an assistant message, appending `suffix` first if given.
    ///
    /// Returns `Ok(true)` for the call that settled it and `Ok(false)` for any
    /// later call, which changes nothing.
    pub fn settle(&self, id: Uuid, suffix: Option<&str>) -> Result<bool, StateError> {
        let mut inner = self.lock();
        let message = inner.assistant_mut(id)?;
        if message.phase == MessagePhase::Settled {
            return Ok(false);
        }
        if let Some(suffix) = suffix {
            message.content.push_str(suffix);
            self.publish(ConversationEvent::Appended {
                id,
                text: suffix.to_owned(),
            });
        }
        message.phase = MessagePhase::Settled;
        self.publish(ConversationEvent::Settled { id });
        Ok(true)
    }

    pub fn get(&self, id: Uuid) -> Option<ChatMessage> {
        let inner = self.lock();
        inner.index.get(&id).map(|&slot| inner.messages[slot].clone())
    }

    /// Snapshot in insertion order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` while any assistant message has not settled.
    pub fn is_loading(&self) -> bool {
        self.lock().messages.iter().any(ChatMessage::is_streaming)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assistant_goes_pending_streaming_settled() {
        let conv = Conversation::new();
        let (_, id) = conv.begin_exchange("hi");

        let pending = conv.get(id).expect("message");
        assert_eq!(pending.phase(), MessagePhase::Pending);
        assert!(pending.is_streaming());
        assert!(pending.content().is_empty());

        conv.append(id, "Hel").expect("append");
        conv.append(id, "lo").expect("append");
        assert_eq!(conv.get(id).expect("message").phase(), MessagePhase::Streaming);

        assert_eq!(conv.settle(id, None), Ok(true));
        let settled = conv.get(id).expect("message");
        assert_eq!(settled.content(), "Hello");
        assert!(!settled.is_streaming());
    }

    #[test]
    fn start_streaming_only_from_unsettled() {
        let conv = Conversation::new();
        let id = conv.push_assistant_pending();
        conv.start_streaming(id).expect("open");
        conv.start_streaming(id).expect("reopen");
        assert_eq!(conv.get(id).expect("message").phase(), MessagePhase::Streaming);
        assert!(conv.is_loading());

        conv.settle(id, None).expect("settle");
        assert_eq!(conv.start_streaming(id), Err(StateError::AlreadySettled(id)));
        assert_eq!(conv.get(id).expect("message").phase(), MessagePhase::Settled);
    }

    #[test]
    fn settle_is_idempotent_and_suffix_applies_once() {
        let conv = Conversation::new();
        let id = conv.push_assistant_pending();
        conv.append(id, "partial").expect("append");
        assert_eq!(conv.settle(id, Some(" [x]")), Ok(true));
        assert_eq!(conv.settle(id, Some(" [x]")), Ok(false));
        assert_eq!(conv.get(id).expect("message").content(), "partial [x]");
    }

    #[test]
    fn append_after_settle_is_rejected() {
        let conv = Conversation::new();
        let id = conv.push_assistant_pending();
        conv.settle(id, None).expect("settle");
        assert_eq!(conv.append(id, "late"), Err(StateError::AlreadySettled(id)));
        assert_eq!(conv.get(id).expect("message").content(), "");
    }

    #[test]
    fn user_messages_are_not_writable() {
        let conv = Conversation::new();
        let id = conv.push_user("question");
        assert!(!conv.get(id).expect("message").is_streaming());
        assert_eq!(conv.append(id, "x"), Err(StateError::NotAssistant(id)));
        let unknown = Uuid::new_v4();
        assert_eq!(conv.settle(unknown, None), Err(StateError::UnknownMessage(unknown)));
    }

    #[test]
    fn loading_tracks_unsettled_assistants() {
        let conv = Conversation::new();
        assert!(!conv.is_loading());
        let (_, a) = conv.begin_exchange("one");
        let (_, b) = conv.begin_exchange("two");
        assert!(conv.is_loading());
        conv.settle(a, None).expect("settle");
        assert!(conv.is_loading());
        conv.settle(b, None).expect("settle");
        assert!(!conv.is_loading());
        assert_eq!(conv.len(), 4);
    }

    #[tokio::test]
    async fn events_follow_mutation_order() {
        let conv = Conversation::new();
        let mut events = conv.subscribe();
        let (user, assistant) = conv.begin_exchange("q");
        conv.append(assistant, "a").expect("append");
        conv.settle(assistant, Some("!")).expect("settle");

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                ConversationEvent::Added { id: user, role: Role::User },
                ConversationEvent::Added { id: assistant, role: Role::Assistant },
                ConversationEvent::Appended { id: assistant, text: "a".into() },
                ConversationEvent::Appended { id: assistant, text: "!".into() },
                ConversationEvent::Settled { id: assistant },
            ]
        );
    }
}
