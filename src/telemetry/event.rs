use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Event emitted for a work item
///
/// Serialized as a flat JSON object whose `Type` field names the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Event {
    /// The runner produced a result file and it was published
    #[serde(rename_all = "PascalCase")]
    XUnitTestResult {
        work_item_id: String,
        work_item_friendly_name: String,
        correlation_id: String,
        results_xml_uri: Option<String>,
        test_count: u64,
    },

    /// The work item failed; the error log was published
    #[serde(rename_all = "PascalCase")]
    XUnitTestFailure {
        work_item_id: String,
        work_item_friendly_name: String,
        correlation_id: String,
        error_log_uri: Option<String>,
    },

    /// Out-of-band error notification (e.g. `FailedUpload`)
    #[serde(rename_all = "PascalCase")]
    Error {
        error_type: String,
        message: String,
        details: Option<String>,
        work_item_id: String,
        work_item_friendly_name: String,
        correlation_id: String,
    },
}

impl Event {
    pub fn test_result(settings: &Settings, results_uri: Option<String>, test_count: u64) -> Self {
        Event::XUnitTestResult {
            work_item_id: settings.workitem_id.clone(),
            work_item_friendly_name: settings.workitem_friendly_name.clone(),
            correlation_id: settings.correlation_id.clone(),
            results_xml_uri: results_uri,
            test_count,
        }
    }

    pub fn test_failure(settings: &Settings, error_log_uri: Option<String>) -> Self {
        Event::XUnitTestFailure {
            work_item_id: settings.workitem_id.clone(),
            work_item_friendly_name: settings.workitem_friendly_name.clone(),
            correlation_id: settings.correlation_id.clone(),
            error_log_uri,
        }
    }

    pub fn error(settings: &Settings, code: &str, message: &str, detail: Option<&str>) -> Self {
        Event::Error {
            error_type: code.to_string(),
            message: message.to_string(),
            details: detail.map(str::to_string),
            work_item_id: settings.workitem_id.clone(),
            work_item_friendly_name: settings.workitem_friendly_name.clone(),
            correlation_id: settings.correlation_id.clone(),
        }
    }

    /// Value of the `Type` field
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::XUnitTestResult { .. } => "XUnitTestResult",
            Event::XUnitTestFailure { .. } => "XUnitTestFailure",
            Event::Error { .. } => "Error",
        }
    }
}
