// pgs3/src/storage/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use super::{ObjectStore, RemoteObjectRecord, object_key_for};
use crate::errors::{AppError, Result};

/// Recorded call against `MemoryStore`, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upload(String),
    Download(String),
    List,
    Delete(String),
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
    calls: Vec<StoreCall>,
}

/// In-memory `ObjectStore` used by orchestrator tests. Uploads are stamped
/// with `upload_time`; failures can be injected per operation.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    upload_time: DateTime<Utc>,
    pub fail_upload: bool,
    /// Uploads keep an empty body instead of reading the local file.
    pub skip_bodies: bool,
    pub fail_list: bool,
    pub fail_download: bool,
    pub fail_delete_key: Option<String>,
}

impl MemoryStore {
    pub fn new(upload_time: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            upload_time,
            fail_upload: false,
            skip_bodies: false,
            fail_list: false,
            fail_download: false,
            fail_delete_key: None,
        }
    }

    pub fn insert(&self, key: &str, body: &[u8], last_modified: DateTime<Utc>) {
        let mut state = self.state.lock().expect("store lock");
        state
            .objects
            .insert(key.to_string(), (body.to_vec(), last_modified));
    }

    pub fn keys(&self) -> Vec<String> {
        let state = self.state.lock().expect("store lock");
        state.objects.keys().cloned().collect()
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().expect("store lock");
        state.objects.get(key).map(|(body, _)| body.clone())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().expect("store lock").calls.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: StoreCall) {
        self.state.lock().expect("store lock").calls.push(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, bucket: &str, local_path: &Path) -> Result<String> {
        let key = object_key_for(local_path).expect("file name");
        self.record(StoreCall::Upload(key.clone()));
        if self.fail_upload {
            return Err(AppError::storage("upload", bucket, &key, "injected failure"));
        }
        let body = if self.skip_bodies {
            Vec::new()
        } else {
            std::fs::read(local_path).map_err(|e| AppError::storage("upload", bucket, &key, e))?
        };
        self.insert(&key, &body, self.upload_time);
        Ok(key)
    }

    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<()> {
        self.record(StoreCall::Download(key.to_string()));
        if self.fail_download {
            // Leave a partial file behind like an interrupted transfer would.
            std::fs::write(destination, b"partial").map_err(|e| AppError::io(destination, e))?;
            return Err(AppError::storage("download", bucket, key, "injected failure"));
        }
        let body = self
            .body(key)
            .ok_or_else(|| AppError::storage("download", bucket, key, "NoSuchKey"))?;
        std::fs::write(destination, body).map_err(|e| AppError::io(destination, e))
    }

    async fn list(&self, bucket: &str) -> Result<Vec<RemoteObjectRecord>> {
        self.record(StoreCall::List);
        if self.fail_list {
            return Err(AppError::storage("list", bucket, "", "injected failure"));
        }
        let state = self.state.lock().expect("store lock");
        Ok(state
            .objects
            .iter()
            .map(|(key, (_, last_modified))| RemoteObjectRecord {
                key: key.clone(),
                last_modified: *last_modified,
            })
            .collect())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.record(StoreCall::Delete(key.to_string()));
        if self.fail_delete_key.as_deref() == Some(key) {
            return Err(AppError::storage("delete", bucket, key, "AccessDenied"));
        }
        self.state.lock().expect("store lock").objects.remove(key);
        Ok(())
    }
}
