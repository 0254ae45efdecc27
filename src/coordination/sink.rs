use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::io::{UploadClient, UploadError, copy_file_preserving};
use crate::settings::Settings;
use crate::telemetry::EventReporter;

/// Error type reported when an upload exhausts its retries
pub const FAILED_UPLOAD_EVENT: &str = "FailedUpload";

/// Where the sink delivers files, fixed when the sink is built
#[derive(Clone)]
pub enum SinkTarget {
    /// Copy into a local directory
    Local(PathBuf),
    /// Upload through a remote client
    Remote(Arc<dyn UploadClient>),
}

/// Delivers local files to the work item's output destination
pub struct ArtifactSink {
    target: SinkTarget,
    reporter: Arc<dyn EventReporter>,
}

impl ArtifactSink {
    pub fn new(target: SinkTarget, reporter: Arc<dyn EventReporter>) -> Self {
        Self { target, reporter }
    }

    /// Publish `file_path` under its base name and return its locator
    ///
    /// Returns `Ok(None)` when a remote upload ran out of retries; a
    /// `FailedUpload` error event has been sent in that case. Other failures
    /// are returned as errors.
    pub async fn publish(&self, settings: &Settings, file_path: &Path) -> Result<Option<String>> {
        let file_name = file_path
            .file_name()
            .with_context(|| format!("Cannot publish {}: no file name", file_path.display()))?;

        match &self.target {
            SinkTarget::Local(dir) => {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

                let output_path = dir.join(file_name);
                copy_file_preserving(file_path, &output_path).await?;
                info!(
                    "Copied {} to {}",
                    file_path.display(),
                    output_path.display()
                );
                Ok(Some(output_path.display().to_string()))
            }
            SinkTarget::Remote(client) => {
                let name = file_name.to_string_lossy();
                match client.upload(file_path, &name).await {
                    Ok(locator) => Ok(Some(locator)),
                    Err(e @ UploadError::RetriesExhausted { .. }) => {
                        warn!("{}", e);
                        let message = format!("Failed to upload {} after retry", file_path.display());
                        if let Err(report_err) = self
                            .reporter
                            .error(settings, FAILED_UPLOAD_EVENT, &message, None)
                            .await
                        {
                            warn!("Failed to report upload failure: {:#}", report_err);
                        }
                        Ok(None)
                    }
                    Err(e) => Err(e).context("Failed to publish artifact"),
                }
            }
        }
    }
}

/// Upload client that records calls and returns a scripted result
#[cfg(test)]
pub(crate) struct ScriptedUploader {
    fail: bool,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedUploader {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every upload runs out of retries
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl UploadClient for ScriptedUploader {
    async fn upload(&self, _file_path: &Path, name: &str) -> Result<String, UploadError> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.fail {
            Err(UploadError::RetriesExhausted {
                name: name.to_string(),
                attempts: 3,
                message: "SlowDown".to_string(),
            })
        } else {
            Ok(format!("s3://bucket/prefix/{}", name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsBuilder;
    use crate::telemetry::reporter::RecordingReporter;
    use tempfile::TempDir;

    fn settings() -> Settings {
        SettingsBuilder::default()
            .workitem_id("wi-1")
            .workitem_friendly_name("wi-1")
            .correlation_id("corr-1")
            .workitem_working_dir("/work")
            .correlation_payload_dir("/payload")
            .output_uri("s3://bucket/prefix")
            .event_uri("/events.jsonl")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_publish_returns_copy_path() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("test_results.xml");
        std::fs::write(&src, "<assemblies/>").unwrap();
        let out = dir.path().join("out");

        let reporter = Arc::new(RecordingReporter::default());
        let sink = ArtifactSink::new(SinkTarget::Local(out.clone()), reporter.clone());

        let locator = sink.publish(&settings(), &src).await.unwrap().unwrap();
        let expected = out.join("test_results.xml");
        assert_eq!(locator, expected.display().to_string());
        assert_eq!(std::fs::read_to_string(&expected).unwrap(), "<assemblies/>");
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn test_local_publish_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let sink = ArtifactSink::new(SinkTarget::Local(dir.path().join("out")), reporter);

        let result = sink.publish(&settings(), &dir.path().join("error.log")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_remote_publish_returns_remote_locator() {
        let uploader = Arc::new(ScriptedUploader::succeeding());
        let reporter = Arc::new(RecordingReporter::default());
        let sink = ArtifactSink::new(SinkTarget::Remote(uploader.clone()), reporter.clone());

        let locator = sink
            .publish(&settings(), Path::new("/work/test_results.xml"))
            .await
            .unwrap();

        assert_eq!(locator.as_deref(), Some("s3://bucket/prefix/test_results.xml"));
        assert_eq!(uploader.calls(), vec!["test_results.xml"]);
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn test_remote_retries_exhausted_reports_failed_upload() {
        let uploader = Arc::new(ScriptedUploader::failing());
        let reporter = Arc::new(RecordingReporter::default());
        let sink = ArtifactSink::new(SinkTarget::Remote(uploader), reporter.clone());

        let locator = sink
            .publish(&settings(), Path::new("/work/error.log"))
            .await
            .unwrap();

        assert_eq!(locator, None);
        let events = reporter.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            crate::telemetry::Event::Error {
                error_type,
                message,
                ..
            } => {
                assert_eq!(error_type, "FailedUpload");
                assert!(message.contains("/work/error.log"));
            }
            other => panic!("Expected error event, got {:?}", other),
        }
    }
}
