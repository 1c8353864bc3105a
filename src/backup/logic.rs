// pgs3/src/backup/logic.rs
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::retention::{filter_older_than, retention_cutoff};
use crate::config::BackupSettings;
use crate::errors::{AppError, Result};
use crate::executor::DumpExecutor;
use crate::storage::ObjectStore;
use crate::utils::remove_staged_file;

/// What one successful backup cycle did. The new backup is durably stored
/// whenever this is returned; the error fields describe follow-up steps
/// that failed afterwards.
#[derive(Debug)]
pub struct BackupReport {
    pub key: String,
    pub cleanup_error: Option<AppError>,
    pub pruned: Vec<String>,
    pub retention_error: Option<AppError>,
}

/// Runs dump, upload, local cleanup and retention pruning, in that order.
/// Holds no state between cycles.
pub struct BackupOrchestrator {
    settings: Arc<BackupSettings>,
    store: Arc<dyn ObjectStore>,
    executor: Arc<dyn DumpExecutor>,
}

impl BackupOrchestrator {
    pub fn new(
        settings: Arc<BackupSettings>,
        store: Arc<dyn ObjectStore>,
        executor: Arc<dyn DumpExecutor>,
    ) -> Self {
        Self {
            settings,
            store,
            executor,
        }
    }

    pub async fn run_cycle(&self) -> Result<BackupReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One backup cycle with `now` as the reference point for retention.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<BackupReport> {
        let settings = &self.settings;
        let bucket = settings.store.bucket.as_str();
        info!(database = %settings.connection.database, bucket, "creating backup");

        let dump_path = self
            .executor
            .create_dump(&settings.connection, &settings.staging_dir, &settings.extra_args)
            .await?;

        let uploaded = self.store.upload(bucket, &dump_path).await;

        // The staged dump goes away whatever happened to the upload.
        let cleanup_error = remove_staged_file(&dump_path).await.err();
        if let Some(err) = &cleanup_error {
            warn!(error = %err, "failed to remove local dump file");
        }

        let key = uploaded?;
        info!(bucket, key = %key, "backup uploaded");

        let (pruned, retention_error) = match retention_cutoff(now, settings.keep_days) {
            Some(cutoff) => match self.prune_before(cutoff).await {
                Ok(pruned) => (pruned, None),
                Err((pruned, err)) => {
                    error!(
                        error = %err,
                        keep_days = settings.keep_days,
                        "retention pruning stopped; the new backup is stored"
                    );
                    (pruned, Some(err))
                }
            },
            None => (Vec::new(), None),
        };

        Ok(BackupReport {
            key,
            cleanup_error,
            pruned,
            retention_error,
        })
    }

    /// Delete every object modified before `cutoff`, one at a time. Stops at
    /// the first failure and returns the keys deleted so far with the error.
    async fn prune_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> std::result::Result<Vec<String>, (Vec<String>, AppError)> {
        let bucket = self.settings.store.bucket.as_str();
        let records = self.store.list(bucket).await.map_err(|e| (Vec::new(), e))?;
        let expired = filter_older_than(&records, cutoff);
        info!(bucket, %cutoff, expired = expired.len(), "applying retention");

        let mut pruned = Vec::with_capacity(expired.len());
        for record in expired {
            if let Err(err) = self.store.delete(bucket, &record.key).await {
                return Err((pruned, err));
            }
            info!(bucket, key = %record.key, "deleted expired backup");
            pruned.push(record.key);
        }
        Ok(pruned)
    }
}
