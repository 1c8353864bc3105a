// pgs3/src/storage/mod.rs
pub(crate) mod s3;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::errors::Result;

/// One object as seen by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRecord {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Capability interface over the object store. Implementations perform no
/// retries; every failure is returned to the caller as `AppError::Storage`.
///
/// Keys only sort meaningfully by `last_modified`, never by key string.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under its base name and return that key.
    /// An existing object with the same key is overwritten.
    async fn upload(&self, bucket: &str, local_path: &Path) -> Result<String>;

    /// Write the object's body to `destination`, creating or truncating it.
    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<()>;

    /// Every object in the bucket, in no particular order.
    async fn list(&self, bucket: &str) -> Result<Vec<RemoteObjectRecord>>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Object key for a local file: its base name.
pub fn object_key_for(local_path: &Path) -> Option<String> {
    local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
