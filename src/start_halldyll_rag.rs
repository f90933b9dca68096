//! Startup helpers for the Halldyll retrieval server.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::rag::{self, RagConfig};
use crate::server::{self, AppState};

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "HALLDYLL_RAG_CONFIG";

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "HALLDYLL_RAG_PORT";

/// Run the server until Ctrl-C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    rag::init_tracing();

    tracing::info!("Starting Halldyll RAG v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let state = match rt.block_on(initialize()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize: {e:#}");
            return ExitCode::from(1);
        }
    };

    let port = get_port();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    if let Err(e) = rt.block_on(run_server_with_shutdown(state, port, shutdown)) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Load configuration from `HALLDYLL_RAG_CONFIG` (if set) and the environment.
///
/// # Errors
/// Returns an error if the file cannot be read or an override is malformed.
pub fn load_config() -> anyhow::Result<RagConfig> {
    let base = match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let path = PathBuf::from(path);
            RagConfig::from_json_file(&path)
                .with_context(|| format!("reading config {}", path.display()))?
        }
        Err(_) => RagConfig::default(),
    };
    let config = base.apply_env().context("applying environment overrides")?;
    config.validate().context("validating config")?;
    Ok(config)
}

/// Build application state and index `documents_dir` when configured.
///
/// # Errors
/// Returns an error if configuration, backend creation or initial ingestion fails.
pub async fn initialize() -> anyhow::Result<Arc<AppState>> {
    let config = load_config()?;
    tracing::info!(
        provider = ?config.embedding.provider,
        store = ?config.vector_store.kind,
        top_k = config.hybrid_search.top_k,
        "configuration loaded"
    );

    let documents_dir = config.data_source.documents_dir.clone();
    let state = AppState::new(config)
        .await
        .context("creating retrieval engine")?;

    if let Some(dir) = documents_dir {
        let report = state
            .engine
            .ingest_dir(&dir)
            .await
            .with_context(|| format!("ingesting {}", dir.display()))?;
        tracing::info!(
            dir = %dir.display(),
            documents = report.documents,
            chunks = report.chunks,
            skipped = report.skipped,
            "initial ingestion complete"
        );
    }

    Ok(state)
}

/// Run server with graceful shutdown.
///
/// # Errors
/// Returns an error if the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    server::run_server_with_shutdown(state, port, shutdown_signal).await
}

/// Get configured server port.
#[must_use]
pub fn get_port() -> u16 {
    parse_port(std::env::var(PORT_ENV).ok().as_deref())
}

fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|p| p.trim().parse().ok())
        .unwrap_or(server::DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(Some("8080")), 8080);
        assert_eq!(parse_port(Some(" 9000 ")), 9000);
        assert_eq!(parse_port(Some("not-a-port")), server::DEFAULT_PORT);
        assert_eq!(parse_port(None), server::DEFAULT_PORT);
    }
}
