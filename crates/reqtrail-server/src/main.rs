//! Reqtrail server - main entry point

use anyhow::Result;
use reqtrail_core::logging::{init_logging, LogConfig, ENV_PREFIX};
use reqtrail_core::{SqliteAuditStore, SqliteStoreOptions};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::info;

use reqtrail_server::{api, config::Config, serve::serve};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = if std::env::vars().any(|(k, _)| k.starts_with(ENV_PREFIX)) {
        LogConfig::from_env()?
    } else {
        LogConfig::builder()
            .log_file_prefix("reqtrail-server")
            .filter_directives("reqtrail_server=debug,reqtrail_core=info,tower_http=debug")
            .build()
    };

    let _log_guard = init_logging(&log_config)?;

    info!("Starting reqtrail server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        database = %config.database.path.display(),
        "Configuration loaded"
    );

    let store = SqliteAuditStore::open(
        &config.database.path,
        SqliteStoreOptions {
            compress_data: config.database.compress_data,
            user_table: config.database.user_table.clone(),
        },
    )?;
    info!("Audit store opened");

    let app = api::router(api::AppState::new(Arc::new(store)), &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    serve(
        listener,
        app,
        Duration::from_secs(config.server.shutdown_timeout_secs),
        shutdown_signal(),
    )
    .await?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
