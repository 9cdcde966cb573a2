//! Sluice Worker - Main entry point

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use sluice_common::logging::{init_logging, LogConfig};
use sluice_worker::{
    config::Config,
    driver::Reconciler,
    store::ftp::FtpConnector,
    trigger::{run_guarded, Scheduler},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Defaults, overridden by environment variables
    let log_config = LogConfig::builder()
        .log_file_prefix("sluice-worker")
        .filter_directives("sluice_worker=info,suppaftp=warn,reqwest=warn")
        .build()
        .merge_env()?;

    init_logging(&log_config)?;

    info!("Starting sluice worker");

    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return Err(e);
        },
    };
    info!(
        users = config.users.len(),
        host = %config.store.host,
        run_as_job = config.run_as_job,
        "Configuration loaded"
    );

    let connector = Arc::new(FtpConnector::new(config.store.clone()));
    let reconciler = Reconciler::new(Arc::clone(&config), connector)?;

    if config.run_as_job {
        // Batch mode: failures are already logged per user and file
        run_guarded(async move { reconciler.run_once().await }).await;
        info!("Batch run complete");
    } else {
        Scheduler::new(reconciler, config.trigger)
            .run(shutdown_signal())
            .await;
    }

    info!("Sluice worker stopped");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
