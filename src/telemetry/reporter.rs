use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::event::Event;
use crate::config::EVENT_REQUEST_TIMEOUT;
use crate::io::EventEndpoint;
use crate::settings::Settings;

/// Abstraction for delivering events to a telemetry endpoint
///
/// Delivery is fire-and-forget: an `Ok` means the endpoint accepted the event,
/// an `Err` means the client itself failed. Implementations do not retry.
#[async_trait]
pub trait EventReporter: Send + Sync {
    /// Deliver one event
    async fn send(&self, event: &Event) -> Result<()>;

    /// Deliver an out-of-band error notification
    async fn error(
        &self,
        settings: &Settings,
        code: &str,
        message: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        self.send(&Event::error(settings, code, message, detail))
            .await
    }
}

/// Build the reporter for a resolved endpoint
pub fn create_from_endpoint(endpoint: &EventEndpoint) -> Result<Arc<dyn EventReporter>> {
    match endpoint {
        EventEndpoint::Http(url) => Ok(Arc::new(HttpEventReporter::new(url.clone())?)),
        EventEndpoint::File(path) => Ok(Arc::new(FileEventReporter::new(path.clone()))),
    }
}

/// EventReporter that POSTs each event as JSON
#[derive(Debug, Clone)]
pub struct HttpEventReporter {
    client: reqwest::Client,
    url: Url,
}

impl HttpEventReporter {
    pub fn new(url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(EVENT_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build event HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl EventReporter for HttpEventReporter {
    async fn send(&self, event: &Event) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(event)
            .send()
            .await
            .with_context(|| format!("Failed to send {} event", event.type_name()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "Event endpoint rejected {} event with status {}",
                event.type_name(),
                status
            ));
        }

        debug!("Sent {} event to {}", event.type_name(), self.url);
        Ok(())
    }
}

/// EventReporter that appends each event as one JSON line to a local file
#[derive(Debug, Clone)]
pub struct FileEventReporter {
    path: PathBuf,
}

impl FileEventReporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl EventReporter for FileEventReporter {
    async fn send(&self, event: &Event) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create event log directory")?;
        }

        let mut line = serde_json::to_string(event).context("Failed to serialize event")?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open event log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event log")?;

        debug!("Wrote {} event to {}", event.type_name(), self.path.display());
        Ok(())
    }
}

/// Reporter that keeps events in memory, for tests across the crate
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingReporter {
    pub events: std::sync::Mutex<Vec<Event>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.type_name() == type_name)
            .count()
    }
}

#[cfg(test)]
#[async_trait]
impl EventReporter for RecordingReporter {
    async fn send(&self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Read back the events written by a [`FileEventReporter`]
#[cfg(test)]
pub(crate) fn read_event_log(path: &std::path::Path) -> Vec<Event> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
