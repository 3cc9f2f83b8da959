//! Client side of the SafeContract chat stream.
//!
//! [`ChatClient::send_message`] records the user turn and a pending assistant
//! message in a [`Conversation`], opens the reply stream through a
//! [`ReplyTransport`], and lets a [`StreamConsumer`] decode increments into
//! the assistant message until it settles. A UI observes the conversation
//! through [`Conversation::subscribe`].

mod client;
mod consumer;
mod error;
mod message;
mod transport;

pub use client::{ChatClient, Settlement};
pub use consumer::{INTERRUPTED_SUFFIX, Outcome, StreamConsumer};
pub use error::{StateError, TransportError};
pub use message::{ChatMessage, Conversation, ConversationEvent, MessagePhase};
pub use safecontract_core::{CancelHandle, CancelSignal, Role, cancel_channel};
pub use transport::{ByteStream, HttpTransport, ReplyTransport};
