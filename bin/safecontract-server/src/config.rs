//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use safecontract_core::AzureCredentials;
use safecontract_core::completion::DEFAULT_TOKEN_DELAY;

/// Origins of the local front-end dev servers and the compose front-end.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:5222",
    "http://localhost:8080",
    "http://frontend:8080",
];

/// Runtime configuration for safecontract-server.
///
/// Every field has a default so the server starts without any environment
/// variables set, in simulated mode.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5222"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Allowed CORS origins. A `"*"` entry allows any origin.
    pub cors_allowed_origins: Vec<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Replaces the built-in persona preamble.
    pub persona: Option<String>,

    /// Delay before each increment of the simulated backend.
    pub simulated_delay: Duration,

    pub azure: AzureCredentials,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cors_allowed_origins = match non_blank("SAFECONTRACT_CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|s| (*s).to_owned()).collect(),
        };

        Self {
            bind_address: env_or("SAFECONTRACT_BIND", "0.0.0.0:5222"),
            log_level: env_or("SAFECONTRACT_LOG", "info"),
            log_json: lookup("SAFECONTRACT_LOG_JSON").is_some_and(|v| parse_bool(&v)),
            cors_allowed_origins,
            enable_docs: lookup("SAFECONTRACT_ENABLE_DOCS").is_none_or(|v| parse_bool(&v)),
            persona: non_blank("SAFECONTRACT_PERSONA"),
            simulated_delay: lookup("SAFECONTRACT_SIM_DELAY_MS")
                .and_then(|v| v.trim().parse().ok())
                .map_or(DEFAULT_TOKEN_DELAY, Duration::from_millis),
            azure: AzureCredentials {
                api_key: lookup("AZURE_OPENAI_KEY"),
                endpoint: lookup("AZURE_OPENAI_ENDPOINT"),
                deployment: lookup("AZURE_OPENAI_DEPLOYMENT"),
                api_version: lookup("AZURE_OPENAI_API_VERSION"),
            },
        }
    }

    /// `true` when any origin may call the API.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == "*")
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}
