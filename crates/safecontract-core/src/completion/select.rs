//! Start-up choice between the real and the simulated backend.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{AzureOpenAiSource, CompletionSource, SimulatedSource};

pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";
pub const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI settings as read from configuration; any may be absent.
#[derive(Clone, Default)]
pub struct AzureCredentials {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

/// A fully specified Azure OpenAI deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureTarget {
    pub api_key: String,
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

/// Which completion backend the process runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    Simulated,
    Passthrough(AzureTarget),
}

impl BackendChoice {
    /// Passthrough iff both key and endpoint are present and non-blank.
    pub fn from_credentials(credentials: &AzureCredentials) -> Self {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        match (present(&credentials.api_key), present(&credentials.endpoint)) {
            (Some(api_key), Some(endpoint)) => BackendChoice::Passthrough(AzureTarget {
                api_key,
                endpoint,
                deployment: present(&credentials.deployment)
                    .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_owned()),
                api_version: present(&credentials.api_version)
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_owned()),
            }),
            _ => BackendChoice::Simulated,
        }
    }
}

/// Instantiate the completion source for a backend choice.
pub fn build_completion_source(
    choice: &BackendChoice,
    token_delay: Duration,
) -> Arc<dyn CompletionSource> {
    match choice {
        BackendChoice::Simulated => Arc::new(SimulatedSource::new(token_delay)),
        BackendChoice::Passthrough(target) => Arc::new(AzureOpenAiSource::new(target.clone())),
    }
}

// Keys never reach logs.
impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl fmt::Debug for AzureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureTarget")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}
