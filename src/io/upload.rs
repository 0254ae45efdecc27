use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::uri::RemoteDestination;
use crate::config::{MAX_UPLOAD_ATTEMPTS, UPLOAD_RETRY_DELAY};

/// Errors returned by an [`UploadClient`]
#[derive(Debug, Error)]
pub enum UploadError {
    /// The remote store kept rejecting the upload until the retry budget ran out
    #[error("upload of {name} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        name: String,
        attempts: u32,
        message: String,
    },

    /// The local file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Abstraction for storing a local file at a named remote location
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// Upload `file_path` under `name` and return a locator for the stored object
    async fn upload(&self, file_path: &Path, name: &str) -> Result<String, UploadError>;
}

/// UploadClient implementation for S3 buckets
#[derive(Clone)]
pub struct S3UploadClient {
    s3_client: Arc<S3Client>,
    destination: RemoteDestination,
}

impl S3UploadClient {
    /// Create a new S3UploadClient
    pub fn new(s3_client: Arc<S3Client>, destination: RemoteDestination) -> Self {
        Self {
            s3_client,
            destination,
        }
    }

    async fn put_once(&self, file_path: &Path, key: &str) -> Result<(), String> {
        let body = ByteStream::from_path(file_path)
            .await
            .map_err(|e| e.to_string())?;

        self.s3_client
            .put_object()
            .bucket(&self.destination.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| format!("{}", aws_sdk_s3::error::DisplayErrorContext(e)))?;

        Ok(())
    }
}

#[async_trait]
impl UploadClient for S3UploadClient {
    async fn upload(&self, file_path: &Path, name: &str) -> Result<String, UploadError> {
        // Fail fast on unreadable input; retrying cannot fix it
        tokio::fs::metadata(file_path)
            .await
            .map_err(|source| UploadError::Io {
                path: file_path.to_path_buf(),
                source,
            })?;

        let key = self.destination.key_for(name);
        let mut last_error = String::new();

        for attempt in 1..=MAX_UPLOAD_ATTEMPTS {
            match self.put_once(file_path, &key).await {
                Ok(()) => {
                    let locator = format!("s3://{}/{}", self.destination.bucket, key);
                    info!("Uploaded {} to {}", file_path.display(), locator);
                    return Ok(locator);
                }
                Err(e) => {
                    warn!(
                        "Upload attempt {}/{} for {} failed: {}",
                        attempt, MAX_UPLOAD_ATTEMPTS, key, e
                    );
                    last_error = e;
                    if attempt < MAX_UPLOAD_ATTEMPTS {
                        tokio::time::sleep(UPLOAD_RETRY_DELAY * attempt).await;
                    }
                }
            }
        }

        Err(UploadError::RetriesExhausted {
            name: name.to_string(),
            attempts: MAX_UPLOAD_ATTEMPTS,
            message: last_error,
        })
    }
}
