// pgs3/src/executor.rs
use async_trait::async_trait;
use chrono::Local;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};
use which::which;

use crate::backup::db_dump::{dump_args, dump_file_name};
use crate::config::ConnectionConfig;
use crate::errors::{AppError, Result};
use crate::restore::db_restore::restore_args;
use crate::utils::remove_staged_file;

const PASSWORD_ENV: &str = "PGPASSWORD";

/// Runs the external dump and restore programs.
#[async_trait]
pub trait DumpExecutor: Send + Sync {
    /// Dump the database into a new file under `staging_dir` and return its path.
    async fn create_dump(
        &self,
        conn: &ConnectionConfig,
        staging_dir: &Path,
        extra_args: &[String],
    ) -> Result<PathBuf>;

    /// Restore `dump_path` into the database, dropping existing objects first.
    async fn restore_dump(&self, conn: &ConnectionConfig, dump_path: &Path) -> Result<()>;
}

/// `pg_dump` / `pg_restore` from the PostgreSQL client tools.
#[derive(Debug, Clone)]
pub struct PgTools {
    pg_dump: String,
    pg_restore: String,
}

impl Default for PgTools {
    fn default() -> Self {
        Self::with_programs("pg_dump", "pg_restore")
    }
}

impl PgTools {
    /// Use other program names or paths, e.g. a versioned `pg_dump-16`.
    pub fn with_programs(pg_dump: impl Into<String>, pg_restore: impl Into<String>) -> Self {
        Self {
            pg_dump: pg_dump.into(),
            pg_restore: pg_restore.into(),
        }
    }

    async fn run(&self, program: &str, conn: &ConnectionConfig, args: Vec<OsString>) -> Result<()> {
        let executable = find_executable(program)?;
        debug!(program, executable = %executable.display(), ?args, "running subprocess");

        let output = Command::new(&executable)
            .args(&args)
            .env(PASSWORD_ENV, &conn.password)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::subprocess(program, None, e.to_string()))?;

        if !output.status.success() {
            return Err(AppError::subprocess(
                program,
                Some(output.status),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

fn find_executable(program: &str) -> Result<PathBuf> {
    which(program).map_err(|_| {
        AppError::subprocess(
            program,
            None,
            format!(
                "{program} executable not found in PATH. Please ensure PostgreSQL client tools are installed and in your PATH."
            ),
        )
    })
}

#[async_trait]
impl DumpExecutor for PgTools {
    async fn create_dump(
        &self,
        conn: &ConnectionConfig,
        staging_dir: &Path,
        extra_args: &[String],
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(staging_dir)
            .await
            .map_err(|e| AppError::io(staging_dir, e))?;

        let dump_path = staging_dir.join(dump_file_name(&conn.database, &Local::now().naive_local()));
        info!(database = %conn.database, path = %dump_path.display(), "creating dump");

        if let Err(err) = self
            .run(&self.pg_dump, conn, dump_args(conn, &dump_path, extra_args))
            .await
        {
            // pg_dump may have written part of the file before failing.
            if let Err(cleanup) = remove_staged_file(&dump_path).await {
                warn!(error = %cleanup, "failed to remove partial dump");
            }
            return Err(err);
        }
        Ok(dump_path)
    }

    async fn restore_dump(&self, conn: &ConnectionConfig, dump_path: &Path) -> Result<()> {
        info!(database = %conn.database, path = %dump_path.display(), "restoring dump");
        self.run(&self.pg_restore, conn, restore_args(conn, dump_path))
            .await
    }
}
