//! safecontract-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON or human readable).
//! 3. Choose the completion backend from the Azure OpenAI credentials.
//! 4. Build the orchestrator and shared state.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod context;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use safecontract_core::{
    BackendChoice, ChatOrchestrator, KeywordRetrieval, build_completion_source,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);

    info!(version = env!("CARGO_PKG_VERSION"), "safecontract-server starting");

    // ── 3. Completion backend ──────────────────────────────────────────────────
    let backend = BackendChoice::from_credentials(&cfg.azure);
    match &backend {
        BackendChoice::Simulated => info!(
            delay_ms = cfg.simulated_delay.as_millis(),
            "no Azure OpenAI credentials; running in simulated mode"
        ),
        BackendChoice::Passthrough(target) => info!(
            endpoint = %target.endpoint,
            deployment = %target.deployment,
            api_version = %target.api_version,
            "using Azure OpenAI passthrough"
        ),
    }
    let completion = build_completion_source(&backend, cfg.simulated_delay);

    // ── 4. Shared application state ────────────────────────────────────────────
    let mut orchestrator = ChatOrchestrator::new(Arc::new(KeywordRetrieval::default()), completion);
    if let Some(persona) = &cfg.persona {
        info!("using configured persona");
        orchestrator = orchestrator.with_persona(persona.clone());
    }

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        orchestrator,
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, docs = cfg.enable_docs, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("safecontract-server stopped");
    Ok(())
}

/// `RUST_LOG` wins over `SAFECONTRACT_LOG`; an unparsable filter falls back to `info`.
fn init_tracing(cfg: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| cfg.log_level.parse())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Ctrl-C handler unavailable");
            }
        }
        _ = terminate => {}
    }
    info!("shutting down");
}
