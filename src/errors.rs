use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid settings. Raised before any work starts.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{program} failed ({status}): {stderr}")]
    Subprocess {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Storage operation '{operation}' failed for s3://{bucket}/{key}: {message}")]
    Storage {
        operation: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("No backups found in bucket {bucket}")]
    NotFound { bucket: String },

    #[error("Failed to remove local file {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Config(message.into())
    }

    pub fn storage(
        operation: &'static str,
        bucket: &str,
        key: &str,
        message: impl std::fmt::Display,
    ) -> Self {
        AppError::Storage {
            operation,
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub fn subprocess(program: &str, status: Option<ExitStatus>, stderr: impl Into<String>) -> Self {
        AppError::Subprocess {
            program: program.to_string(),
            status: status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "not started".to_string()),
            stderr: stderr.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
