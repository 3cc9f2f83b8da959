//! Streaming pipeline for the SafeContract legal copilot.
//!
//! A request flows through [`orchestrator::ChatOrchestrator`], which consults a
//! [`retrieval::RetrievalProvider`], builds a [`history::ConversationHistory`]
//! and pulls [`increment::Increment`]s from a [`completion::CompletionSource`].
//! [`framing`] fixes the byte-level contract used to carry those increments
//! between server and client.

pub mod cancel;
pub mod completion;
pub mod error;
pub mod framing;
pub mod history;
pub mod increment;
pub mod orchestrator;
pub mod retrieval;

pub use cancel::{CancelHandle, CancelSignal, cancel_channel};
pub use completion::{
    AzureCredentials, AzureOpenAiSource, AzureTarget, BackendChoice, CompletionSource,
    SimulatedSource, build_completion_source,
};
pub use error::{FrameError, GenerationError, RetrievalError};
pub use history::{ChatTurn, ConversationHistory, Role};
pub use increment::{Increment, IncrementStream};
pub use orchestrator::ChatOrchestrator;
pub use retrieval::{KeywordRetrieval, RetrievalProvider};
