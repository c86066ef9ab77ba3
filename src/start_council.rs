//! Startup helpers for the council server.

use std::process::ExitCode;
use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::conversations::repository::SqliteConversationRepository;
use crate::core::config::CouncilConfig;
use crate::core::errors::CouncilResult;
use crate::server::{self, AppState};

/// Run the server (used by the `council-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    let config = match CouncilConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(false);
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    init_tracing(config.debug);
    tracing::info!("Starting Council of Sheldons v{}", env!("CARGO_PKG_VERSION"));
    if config.debug {
        tracing::debug!("Debug mode enabled: {config:?}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let port = config.server.port;
    let result = rt.block_on(async move {
        let state = initialize(config).await?;
        server::run_server_with_shutdown(state, port, shutdown_signal()).await
    });

    if let Err(e) = result {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Council server stopped");
    ExitCode::SUCCESS
}

/// Initialize tracing; `debug` lowers the default level.
pub fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init();
}

/// Build application state, opening `SQLite` persistence when configured.
///
/// # Errors
/// Returns an error if the database cannot be opened or read.
pub async fn initialize(config: CouncilConfig) -> CouncilResult<Arc<AppState>> {
    let Some(path) = config.storage.sqlite_path.clone() else {
        tracing::info!("No sqlite path configured; conversations stay in memory");
        return Ok(AppState::new(config));
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!("Persisting conversations to {}", path.display());
    let conn = Connection::open(path).await?;
    let repository =
        SqliteConversationRepository::new(Arc::new(conn), config.storage.table.clone()).await?;
    AppState::with_repository(config, Arc::new(repository)).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
