// pgs3/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::{Credentials, Region};
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{ObjectStore, RemoteObjectRecord, object_key_for};
use crate::config::StoreConfig;
use crate::errors::{AppError, Result};

/// `ObjectStore` backed by AWS S3 or any S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: s3::Client,
}

impl S3ObjectStore {
    /// Build a client from static credentials. Path-style addressing is
    /// forced so custom endpoints (MinIO, Spaces, ...) resolve buckets.
    pub async fn connect(store: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(store.region.clone()))
            .credentials_provider(Credentials::new(
                &store.access_key_id,
                &store.secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        if let Some(endpoint) = &store.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        debug!(region = %store.region, endpoint = ?store.endpoint, "S3 client configured");
        Self {
            client: s3::Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, bucket: &str, local_path: &Path) -> Result<String> {
        let key = object_key_for(local_path).ok_or_else(|| {
            AppError::storage(
                "upload",
                bucket,
                &local_path.display().to_string(),
                "local path has no file name",
            )
        })?;

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| AppError::storage("upload", bucket, &key, e))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::storage("upload", bucket, &key, DisplayErrorContext(&e)))?;

        info!(bucket, key = %key, path = %local_path.display(), "uploaded backup");
        Ok(key)
    }

    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<()> {
        let mut object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::storage("download", bucket, key, DisplayErrorContext(&e)))?;

        let mut output_file = File::create(destination)
            .await
            .map_err(|e| AppError::io(destination, e))?;

        let mut total_bytes_downloaded = 0usize;
        while let Some(bytes_chunk) = object
            .body
            .try_next()
            .await
            .map_err(|e| AppError::storage("download", bucket, key, e))?
        {
            output_file
                .write_all(&bytes_chunk)
                .await
                .map_err(|e| AppError::io(destination, e))?;
            total_bytes_downloaded += bytes_chunk.len();
        }
        output_file
            .flush()
            .await
            .map_err(|e| AppError::io(destination, e))?;

        info!(
            bucket,
            key,
            bytes = total_bytes_downloaded,
            path = %destination.display(),
            "downloaded backup"
        );
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<RemoteObjectRecord>> {
        let mut records = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| AppError::storage("list", bucket, "", DisplayErrorContext(&e)))?;

            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                match object.last_modified().and_then(to_chrono) {
                    Some(last_modified) => records.push(RemoteObjectRecord {
                        key: key.to_string(),
                        last_modified,
                    }),
                    None => warn!(bucket, key, "skipping object without last-modified timestamp"),
                }
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(bucket, objects = records.len(), "listed bucket");
        Ok(records)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::storage("delete", bucket, key, DisplayErrorContext(&e)))?;
        Ok(())
    }
}

fn to_chrono(timestamp: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
