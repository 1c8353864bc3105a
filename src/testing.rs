// pgs3/src/testing.rs
//! Doubles shared by the orchestrator and scheduler tests.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use crate::config::{BackupSettings, ConnectionConfig, StoreConfig};
use crate::errors::{AppError, Result};
use crate::executor::DumpExecutor;

pub const DUMP_NAME: &str = "app_2024-03-10T00:00:00.dump";

/// `DumpExecutor` that writes a small file instead of running pg_dump and
/// records what it was asked to restore.
#[derive(Default)]
pub struct FakeExecutor {
    pub fail_dump: bool,
    pub fail_restore: bool,
    /// Stage the dump as a directory so removing it afterwards fails.
    pub dump_as_dir: bool,
    pub dumps: AtomicUsize,
    pub restored: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    /// When set, `create_dump` waits for a notification before returning.
    pub hold_dump: Option<std::sync::Arc<Notify>>,
    pub dump_started: Notify,
}

impl FakeExecutor {
    pub fn dump_count(&self) -> usize {
        self.dumps.load(Ordering::SeqCst)
    }

    pub fn restored(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.restored.lock().expect("restored lock").clone()
    }
}

#[async_trait]
impl DumpExecutor for FakeExecutor {
    async fn create_dump(
        &self,
        _conn: &ConnectionConfig,
        staging_dir: &Path,
        _extra_args: &[String],
    ) -> Result<PathBuf> {
        self.dumps.fetch_add(1, Ordering::SeqCst);
        self.dump_started.notify_one();
        if let Some(gate) = &self.hold_dump {
            gate.notified().await;
        }
        if self.fail_dump {
            return Err(AppError::subprocess("pg_dump", None, "connection refused"));
        }
        let path = staging_dir.join(DUMP_NAME);
        if self.dump_as_dir {
            std::fs::create_dir_all(&path).map_err(|e| AppError::io(&path, e))?;
            return Ok(path);
        }
        std::fs::write(&path, b"dump-bytes").map_err(|e| AppError::io(&path, e))?;
        Ok(path)
    }

    async fn restore_dump(&self, _conn: &ConnectionConfig, dump_path: &Path) -> Result<()> {
        let body = std::fs::read(dump_path).map_err(|e| AppError::io(dump_path, e))?;
        self.restored
            .lock()
            .expect("restored lock")
            .push((dump_path.to_path_buf(), body));
        if self.fail_restore {
            return Err(AppError::subprocess("pg_restore", None, "role does not exist"));
        }
        Ok(())
    }
}

pub fn backup_settings(staging_dir: &Path, keep_days: i64) -> BackupSettings {
    BackupSettings {
        connection: ConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "hunter2".to_string(),
            database: "app".to_string(),
        },
        store: StoreConfig {
            bucket: "backups".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: "AKIA".to_string(),
            secret_access_key: "wJalrXUtnFEMI".to_string(),
        },
        staging_dir: staging_dir.to_path_buf(),
        schedule: None,
        keep_days,
        extra_args: Vec::new(),
    }
}
