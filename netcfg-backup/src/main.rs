//! netcfg-backup - Main entry point
//!
//! Backs up the running configuration of every configured device once, or
//! on a cron schedule until interrupted.

use anyhow::Result;
use clap::Parser;
use netcfg_backup::notify::NotificationReporter;
use netcfg_backup::scheduler::BackupScheduler;
use netcfg_backup::session::SshConnector;
use netcfg_backup::store::Committer;
use netcfg_backup::utils::{self, ConfigError};
use netcfg_backup::{
    AppConfig, BackupJob, DeviceBackupWorker, Orchestrator, VersionedStore, WorkerSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file (otherwise the environment is used)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dotenv file to load before reading the environment
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single job even when a schedule is configured
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(args.env_file.as_deref()),
    };

    let log_level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.log.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    utils::logger::init(&log_level)?;

    let config = match loaded.and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(ConfigError::NoDevices) => {
            tracing::info!("No devices configured, nothing to back up");
            return Ok(());
        }
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Ok(());
        }
    };

    tracing::info!(
        "Starting netcfg-backup v{} for {} devices",
        env!("CARGO_PKG_VERSION"),
        config.devices.len()
    );

    let root = config.storage.backup_dir.clone();
    let extension = config.storage.extension.clone();
    let committer = Committer {
        name: config.storage.committer_name.clone(),
        email: config.storage.committer_email.clone(),
    };
    let store = tokio::task::spawn_blocking(move || {
        VersionedStore::open_or_init(&root, &extension, committer)
    })
    .await??;

    let connector = Arc::new(SshConnector::from_config(&config)?);
    let worker = Arc::new(DeviceBackupWorker::new(
        connector,
        Arc::new(store),
        WorkerSettings::from_config(&config),
    ));
    let job = Arc::new(BackupJob::new(
        Orchestrator::new(worker, config.job.max_workers),
        NotificationReporter::from_config(&config)?,
        config.devices.clone(),
    ));

    match config.job.schedule.as_deref().filter(|_| !args.once) {
        Some(cron) => run_scheduled(job, cron).await?,
        None => {
            job.run().await;
        }
    }

    tracing::info!("Backup finished");
    Ok(())
}

async fn run_scheduled(job: Arc<BackupJob>, cron: &str) -> Result<()> {
    let scheduler = BackupScheduler::new(job).await?;
    scheduler.schedule(cron).await?;
    scheduler.start().await?;

    shutdown_signal().await;

    tracing::info!("Shutting down, waiting for running job...");
    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
