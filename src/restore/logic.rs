// pgs3/src/restore/logic.rs
use std::sync::Arc;
use tracing::{info, warn};

use super::latest::latest_key;
use crate::config::RestoreSettings;
use crate::errors::{AppError, Result};
use crate::executor::DumpExecutor;
use crate::storage::ObjectStore;
use crate::utils::remove_staged_file;

const STAGED_DUMP_NAME: &str = "backup.dump";

/// Restores the most recent backup in the bucket into the configured database.
pub struct RestoreOrchestrator {
    settings: Arc<RestoreSettings>,
    store: Arc<dyn ObjectStore>,
    executor: Arc<dyn DumpExecutor>,
}

impl RestoreOrchestrator {
    pub fn new(
        settings: Arc<RestoreSettings>,
        store: Arc<dyn ObjectStore>,
        executor: Arc<dyn DumpExecutor>,
    ) -> Self {
        Self {
            settings,
            store,
            executor,
        }
    }

    /// Download the latest backup and restore it. Returns the restored key.
    ///
    /// Existing objects in the target database are dropped and recreated.
    pub async fn run_restore(&self) -> Result<String> {
        let settings = &self.settings;
        let bucket = settings.store.bucket.as_str();
        warn!(
            database = %settings.connection.database,
            host = %settings.connection.host,
            "restoring the latest backup; existing objects in the target database will be replaced"
        );

        let records = self.store.list(bucket).await?;
        let key = latest_key(bucket, &records)?;
        info!(bucket, key = %key, candidates = records.len(), "selected latest backup");

        tokio::fs::create_dir_all(&settings.staging_dir)
            .await
            .map_err(|e| AppError::io(&settings.staging_dir, e))?;
        let staged = settings.staging_dir.join(STAGED_DUMP_NAME);

        let result = self.download_and_restore(bucket, &key, &staged).await;

        if let Err(err) = remove_staged_file(&staged).await {
            warn!(error = %err, "failed to remove downloaded dump");
        }

        result?;
        info!(bucket, key = %key, database = %settings.connection.database, "restore completed");
        Ok(key)
    }

    async fn download_and_restore(&self, bucket: &str, key: &str, staged: &std::path::Path) -> Result<()> {
        self.store.download(bucket, key, staged).await?;
        self.executor
            .restore_dump(&self.settings.connection, staged)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryStore, StoreCall};
    use crate::testing::{FakeExecutor, backup_settings};
    use chrono::{DateTime, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("rfc3339")
            .with_timezone(&Utc)
    }

    fn orchestrator(
        staging: &std::path::Path,
        store: Arc<MemoryStore>,
        executor: Arc<FakeExecutor>,
    ) -> RestoreOrchestrator {
        let settings = backup_settings(staging, 0).restore_settings();
        RestoreOrchestrator::new(Arc::new(settings), store, executor)
    }

    fn store_with_history() -> MemoryStore {
        let store = MemoryStore::new(at("2024-03-10T00:00:00Z"));
        store.insert("zzz_2024-03-01.dump", b"march-first", at("2024-03-01T00:00:00Z"));
        store.insert("aaa_2024-03-09.dump", b"march-ninth", at("2024-03-09T00:00:00Z"));
        store.insert("mmm_2024-03-05.dump", b"march-fifth", at("2024-03-05T00:00:00Z"));
        store
    }

    #[tokio::test]
    async fn restores_the_most_recently_modified_object() {
        let staging = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(store_with_history());
        let executor = Arc::new(FakeExecutor::default());

        let key = orchestrator(staging.path(), store.clone(), executor.clone())
            .run_restore()
            .await
            .expect("restore");

        assert_eq!(key, "aaa_2024-03-09.dump");
        let restored = executor.restored();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].0, staging.path().join(STAGED_DUMP_NAME));
        assert_eq!(restored[0].1, b"march-ninth");
        assert!(!staging.path().join(STAGED_DUMP_NAME).exists());
    }

    #[tokio::test]
    async fn empty_bucket_is_not_found_and_touches_nothing() {
        let staging = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new(at("2024-03-10T00:00:00Z")));
        let executor = Arc::new(FakeExecutor::default());

        let err = orchestrator(staging.path(), store.clone(), executor.clone())
            .run_restore()
            .await
            .expect_err("nothing to restore");

        assert!(matches!(err, AppError::NotFound { ref bucket } if bucket == "backups"));
        assert_eq!(store.calls(), vec![StoreCall::List]);
        assert!(executor.restored().is_empty());
    }

    #[tokio::test]
    async fn partial_download_is_removed_and_restore_skipped() {
        let staging = tempfile::tempdir().expect("tempdir");
        let mut store = store_with_history();
        store.fail_download = true;
        let store = Arc::new(store);
        let executor = Arc::new(FakeExecutor::default());

        let err = orchestrator(staging.path(), store, executor.clone())
            .run_restore()
            .await
            .expect_err("download fails");

        assert!(matches!(err, AppError::Storage { operation: "download", .. }));
        assert!(executor.restored().is_empty());
        assert!(!staging.path().join(STAGED_DUMP_NAME).exists());
    }

    #[tokio::test]
    async fn failed_restore_still_removes_staged_file() {
        let staging = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(store_with_history());
        let executor = Arc::new(FakeExecutor {
            fail_restore: true,
            ..Default::default()
        });

        let err = orchestrator(staging.path(), store, executor.clone())
            .run_restore()
            .await
            .expect_err("restore fails");

        assert!(matches!(err, AppError::Subprocess { ref program, .. } if program == "pg_restore"));
        assert_eq!(executor.restored().len(), 1);
        assert!(!staging.path().join(STAGED_DUMP_NAME).exists());
    }

    #[tokio::test]
    async fn missing_staging_dir_is_created() {
        let staging = tempfile::tempdir().expect("tempdir");
        let nested = staging.path().join("pgs3").join("restore");
        let store = Arc::new(store_with_history());
        let executor = Arc::new(FakeExecutor::default());

        orchestrator(&nested, store, executor.clone())
            .run_restore()
            .await
            .expect("restore");

        assert!(nested.is_dir());
        assert_eq!(executor.restored()[0].0, nested.join(STAGED_DUMP_NAME));
    }
}
