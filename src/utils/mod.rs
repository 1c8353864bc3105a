// pgs3/src/utils/mod.rs
use std::io::ErrorKind;
use std::path::Path;

use crate::errors::{AppError, Result};

/// Delete a staged dump file. A file that is already gone counts as removed.
pub async fn remove_staged_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(AppError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}
