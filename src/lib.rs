// athlete-gateway
// REST endpoints for athletes, each request dispatched to a `{verb}_{entity}`
// stored procedure on SQL Server

pub mod api;
pub mod config;
pub mod db;
pub mod server;

use std::sync::Arc;

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use config::Settings;
use db::{ConnectionManager, MssqlConnector};
use server::{run_server, ServerError};

/// Install the global fmt subscriber, filtered by `RUST_LOG` (default `info`).
/// Fails if a subscriber is already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

/// Build the connection manager from settings and serve until shutdown
pub async fn run(settings: Settings) -> Result<(), ServerError> {
    let connector = MssqlConnector::new(settings.database.clone());
    let manager = Arc::new(ConnectionManager::new(connector, settings.retry_policy()));

    tracing::info!(
        database = %settings.database,
        retry_attempts = settings.retry_attempts,
        retry_delay_secs = settings.retry_delay_secs,
        "Starting athlete gateway"
    );

    run_server(manager, settings.server_config()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_reports_second_install() {
        // Whichever call installs the subscriber, the next one must fail
        // loudly rather than be silently ignored
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
