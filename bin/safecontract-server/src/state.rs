//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use safecontract_core::ChatOrchestrator;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Stateless per-request pipeline; one instance serves all requests.
    pub orchestrator: ChatOrchestrator,
}

#[cfg(test)]
pub(crate) mod fixture {
    use std::sync::Arc;
    use std::time::Duration;

    use safecontract_core::{
        ChatOrchestrator, CompletionSource, KeywordRetrieval, SimulatedSource,
    };

    use super::AppState;
    use crate::config::Config;

    /// Simulated backend without pacing.
    pub fn simulated() -> Arc<AppState> {
        with_source(Arc::new(SimulatedSource::new(Duration::ZERO)), Config::default())
    }

    pub fn with_source(completion: Arc<dyn CompletionSource>, config: Config) -> Arc<AppState> {
        Arc::new(AppState {
            config: Arc::new(config),
            orchestrator: ChatOrchestrator::new(Arc::new(KeywordRetrieval::default()), completion),
        })
    }
}
