//! PostgreSQL to S3 backup tool
//!
//! Dumps a database to an S3 bucket once or on a cron schedule, prunes old
//! backups, and restores the latest one on demand.

// pgs3/src/main.rs
mod backup;
mod config;
mod errors;
mod executor;
mod restore;
mod scheduler;
mod storage;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use backup::BackupOrchestrator;
use config::args::{Cli, Command};
use config::{
    BackupSettings, RawJsonConfig, resolve_backup_settings, resolve_restore_settings,
};
use errors::AppError;
use executor::{DumpExecutor, PgTools};
use restore::RestoreOrchestrator;
use scheduler::Scheduler;
use storage::ObjectStore;
use storage::s3::S3ObjectStore;

const CONFIG_ERROR_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_app(cli).await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            if is_config_error(&e) {
                ExitCode::from(CONFIG_ERROR_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// `RUST_LOG` wins; otherwise info, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "pgs3=debug" } else { "pgs3=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn is_config_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<AppError>().is_some_and(AppError::is_config)
}

async fn run_app(cli: Cli) -> Result<()> {
    let file = match &cli.config {
        Some(path) => RawJsonConfig::load_from_json(path)?,
        None => RawJsonConfig::default(),
    };
    let env = |name: &str| std::env::var(name).ok();
    let executor: Arc<dyn DumpExecutor> = Arc::new(PgTools::default());

    match cli.command {
        Command::Backup(args) => {
            let settings = Arc::new(resolve_backup_settings(&args, &file, env)?);
            let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::connect(&settings.store).await);
            let backup = Arc::new(BackupOrchestrator::new(
                settings.clone(),
                store.clone(),
                executor.clone(),
            ));

            if settings.schedule.is_some() {
                run_scheduled(&settings, backup, store, executor).await
            } else {
                run_once(&backup).await
            }
        }
        Command::Restore(args) => {
            let settings = resolve_restore_settings(&args, &file, env)?;
            let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::connect(&settings.store).await);

            println!("🔄 Starting Restore Process...");
            let restore = RestoreOrchestrator::new(Arc::new(settings), store, executor);
            let key = restore
                .run_restore()
                .await
                .context("Restore process failed")?;
            println!("Restored {key}");
            Ok(())
        }
    }
}

async fn run_once(backup: &BackupOrchestrator) -> Result<()> {
    println!("🚀 Starting Backup Process...");
    let report = backup.run_cycle().await.context("Backup process failed")?;
    println!("Backup stored as {}", report.key);

    if let Some(err) = report.retention_error {
        return Err(anyhow::Error::new(err).context(format!(
            "Backup {} was stored, but pruning old backups failed",
            report.key
        )));
    }
    Ok(())
}

async fn run_scheduled(
    settings: &BackupSettings,
    backup: Arc<BackupOrchestrator>,
    store: Arc<dyn ObjectStore>,
    executor: Arc<dyn DumpExecutor>,
) -> Result<()> {
    let Some(spec) = &settings.schedule else {
        return Ok(());
    };

    let mut scheduler = Scheduler::new(backup, spec.cron.clone());
    if spec.restore_on_startup {
        let restore = RestoreOrchestrator::new(Arc::new(settings.restore_settings()), store, executor);
        scheduler = scheduler.with_startup_restore(Arc::new(restore));
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating graceful shutdown...");
        shutdown.cancel();
    });

    println!("⏰ Backups scheduled with '{}'", spec.cron);
    scheduler.run(cancel).await;
    Ok(())
}
