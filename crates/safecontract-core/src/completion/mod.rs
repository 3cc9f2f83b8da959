//! Completion sources: producers of ordered increment streams.

mod azure;
mod select;
mod simulated;

pub use azure::AzureOpenAiSource;
pub use select::{AzureCredentials, AzureTarget, BackendChoice, build_completion_source};
pub use simulated::{DEFAULT_TOKEN_DELAY, SimulatedSource};

use crate::cancel::CancelSignal;
use crate::history::ConversationHistory;
use crate::increment::IncrementStream;

/// Produces the reply to a conversation as a lazy increment stream.
///
/// Implementations must:
/// - yield increments in production order, never empty ones;
/// - stop yielding once `cancel` is raised (an increment already being
///   produced may still be delivered);
/// - end after at most one `Err` item.
///
/// The returned stream does nothing until polled and cannot be replayed.
pub trait CompletionSource: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn stream(&self, history: ConversationHistory, cancel: CancelSignal) -> IncrementStream;
}
