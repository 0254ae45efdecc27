//! Work item settings
//!
//! `Settings` is built once before the pipeline starts and handed to every
//! component by reference. Values come from three layers, lowest precedence
//! first: a JSON settings file, individual CLI options (with `HELIX_*`
//! environment fallbacks), and repeated `--setting name=value` overrides.

use anyhow::{Context, Result, anyhow};
use derive_builder::Builder;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::io::normalize_separators;

/// Immutable configuration for one work item
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct Settings {
    pub workitem_id: String,
    pub workitem_friendly_name: String,
    pub correlation_id: String,
    /// Work item root: execution directory, result file and error log live here
    pub workitem_working_dir: PathBuf,
    /// Shared read-only tree the work item stages from
    pub correlation_payload_dir: PathBuf,
    /// Destination for published artifacts (`file://`, bare path or `s3://`)
    pub output_uri: String,
    /// Destination for events (`http(s)://`, `file://` or bare path)
    pub event_uri: String,
    /// Region for remote uploads; the AWS default chain is used when unset
    #[builder(default)]
    pub output_region: Option<String>,
}

/// One layer of settings values, any of which may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsLayer {
    pub workitem_id: Option<String>,
    pub workitem_friendly_name: Option<String>,
    pub correlation_id: Option<String>,
    pub workitem_working_dir: Option<String>,
    pub correlation_payload_dir: Option<String>,
    pub output_uri: Option<String>,
    pub event_uri: Option<String>,
    pub output_region: Option<String>,
}

impl SettingsLayer {
    /// Read a layer from a JSON settings file
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Overlay `other` on top of `self`; values present in `other` win
    pub fn merge(self, other: SettingsLayer) -> SettingsLayer {
        SettingsLayer {
            workitem_id: other.workitem_id.or(self.workitem_id),
            workitem_friendly_name: other.workitem_friendly_name.or(self.workitem_friendly_name),
            correlation_id: other.correlation_id.or(self.correlation_id),
            workitem_working_dir: other.workitem_working_dir.or(self.workitem_working_dir),
            correlation_payload_dir: other
                .correlation_payload_dir
                .or(self.correlation_payload_dir),
            output_uri: other.output_uri.or(self.output_uri),
            event_uri: other.event_uri.or(self.event_uri),
            output_region: other.output_region.or(self.output_region),
        }
    }

    /// Apply a single `name=value` override
    pub fn apply_setting(&mut self, pair: &str) -> Result<()> {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid setting '{}'. Expected format: name=value", pair))?;

        let value = Some(value.trim().to_string());
        match name.trim() {
            "workitem_id" => self.workitem_id = value,
            "workitem_friendly_name" => self.workitem_friendly_name = value,
            "correlation_id" => self.correlation_id = value,
            "workitem_working_dir" => self.workitem_working_dir = value,
            "correlation_payload_dir" => self.correlation_payload_dir = value,
            "output_uri" => self.output_uri = value,
            "event_uri" => self.event_uri = value,
            "output_region" => self.output_region = value,
            other => return Err(anyhow!("Unknown setting '{}'", other)),
        }
        Ok(())
    }

    /// Validate the layer and freeze it into `Settings`
    ///
    /// The friendly name falls back to the work item id. Directory settings
    /// accept either path separator.
    pub fn into_settings(self) -> Result<Settings> {
        let mut builder = SettingsBuilder::default();

        if let Some(id) = &self.workitem_id {
            builder.workitem_id(id.clone());
        }
        if let Some(name) = self.workitem_friendly_name.or(self.workitem_id) {
            builder.workitem_friendly_name(name);
        }
        if let Some(correlation_id) = self.correlation_id {
            builder.correlation_id(correlation_id);
        }
        if let Some(dir) = self.workitem_working_dir {
            builder.workitem_working_dir(normalize_separators(&dir));
        }
        if let Some(dir) = self.correlation_payload_dir {
            builder.correlation_payload_dir(normalize_separators(&dir));
        }
        if let Some(uri) = self.output_uri {
            builder.output_uri(uri);
        }
        if let Some(uri) = self.event_uri {
            builder.event_uri(uri);
        }
        builder.output_region(self.output_region);

        builder.build().context("Incomplete work item settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_layer() -> SettingsLayer {
        SettingsLayer {
            workitem_id: Some("wi-1".to_string()),
            workitem_friendly_name: Some("System.Runtime.Tests".to_string()),
            correlation_id: Some("corr-1".to_string()),
            workitem_working_dir: Some("/work/wi-1".to_string()),
            correlation_payload_dir: Some("/payload".to_string()),
            output_uri: Some("file:///out".to_string()),
            event_uri: Some("https://events.example.com".to_string()),
            output_region: None,
        }
    }

    #[test]
    fn test_into_settings_complete() {
        let settings = complete_layer().into_settings().unwrap();
        assert_eq!(settings.workitem_id, "wi-1");
        assert_eq!(settings.workitem_friendly_name, "System.Runtime.Tests");
        assert_eq!(settings.workitem_working_dir, PathBuf::from("/work/wi-1"));
        assert_eq!(settings.output_region, None);
    }

    #[test]
    fn test_into_settings_missing_required_field() {
        let layer = SettingsLayer {
            correlation_id: None,
            ..complete_layer()
        };
        let err = layer.into_settings().unwrap_err();
        assert!(format!("{:#}", err).contains("correlation_id"));
    }

    #[test]
    fn test_friendly_name_defaults_to_id() {
        let layer = SettingsLayer {
            workitem_friendly_name: None,
            ..complete_layer()
        };
        let settings = layer.into_settings().unwrap();
        assert_eq!(settings.workitem_friendly_name, "wi-1");
    }

    #[test]
    fn test_merge_prefers_overlay() {
        let base = complete_layer();
        let overlay = SettingsLayer {
            output_uri: Some("s3://bucket/prefix".to_string()),
            ..SettingsLayer::default()
        };

        let merged = base.merge(overlay);
        assert_eq!(merged.output_uri.as_deref(), Some("s3://bucket/prefix"));
        assert_eq!(merged.workitem_id.as_deref(), Some("wi-1"));
    }

    #[test]
    fn test_apply_setting() {
        let mut layer = SettingsLayer::default();
        layer.apply_setting("event_uri=file:///tmp/events.jsonl").unwrap();
        layer.apply_setting("output_region = us-west-2").unwrap();
        assert_eq!(layer.event_uri.as_deref(), Some("file:///tmp/events.jsonl"));
        assert_eq!(layer.output_region.as_deref(), Some("us-west-2"));
    }

    #[test]
    fn test_apply_setting_rejects_bad_input() {
        let mut layer = SettingsLayer::default();
        assert!(layer.apply_setting("no_equals_sign").is_err());
        assert!(layer.apply_setting("unknown_key=1").is_err());
    }

    #[tokio::test]
    async fn test_load_settings_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"workitem_id": "wi-9", "correlation_id": "corr-9", "output_uri": "/out"}"#,
        )
        .unwrap();

        let layer = SettingsLayer::load(&path).await.unwrap();
        assert_eq!(layer.workitem_id.as_deref(), Some("wi-9"));
        assert_eq!(layer.event_uri, None);
    }

    #[tokio::test]
    async fn test_load_settings_file_rejects_unknown_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"workitem": "typo"}"#).unwrap();

        assert!(SettingsLayer::load(&path).await.is_err());
    }
}
