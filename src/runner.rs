//! High-level runner API for the xunit work item runner.
//!
//! This module hides the wiring of settings, the artifact sink, the event
//! reporter and the coordinator behind a single call. It is the primary API
//! for the CLI and for embedding.

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ASSEMBLY_LIST_ENV_VAR;
use crate::coordination::{ArtifactSink, Coordinator, SinkTarget, WorkItemRequest};
use crate::io::{Destination, EventEndpoint, S3UploadClient};
use crate::settings::Settings;
use crate::telemetry::create_from_endpoint;

pub use crate::config::ORCHESTRATION_FAILURE_EXIT_CODE;
pub use crate::coordination::XunitTestType;
pub use crate::settings::SettingsLayer;

/// Arguments for running one work item
#[derive(Debug, Clone, Default)]
pub struct WorkItemArgs {
    // Settings sources, lowest precedence first
    pub config_file: Option<PathBuf>,
    pub settings: SettingsLayer,
    pub setting_overrides: Vec<String>,

    // Runner invocation
    pub test_dll: PathBuf,
    pub assembly_list: Option<PathBuf>,
    pub xunit_test_type: String,

    // Informational only
    pub framework_in_tpa: bool,
    pub perf_runner: Option<String>,
}

/// Run a work item and return the process exit code
///
/// The result is the runner's own exit code when the pipeline completes, or
/// [`ORCHESTRATION_FAILURE_EXIT_CODE`] for any failure. Failures before the
/// output and event destinations are known (incomplete settings, unparseable
/// URIs) are only logged, since there is nowhere to report them.
///
/// # Example
///
/// ```no_run
/// use xunit_workitem_runner::runner::{WorkItemArgs, run_work_item};
/// use std::path::PathBuf;
///
/// # async fn example() {
/// let args = WorkItemArgs {
///     config_file: Some(PathBuf::from("settings.json")),
///     test_dll: PathBuf::from("System.Runtime.Tests.dll"),
///     assembly_list: Some(PathBuf::from("assemblylist.json")),
///     xunit_test_type: "netcore".to_string(),
///     ..Default::default()
/// };
///
/// let exit_code = run_work_item(args).await;
/// std::process::exit(exit_code);
/// # }
/// ```
pub async fn run_work_item(args: WorkItemArgs) -> i32 {
    match prepare(args).await {
        Ok((coordinator, request)) => coordinator.run(&request).await,
        Err(e) => {
            error!("Failed to set up work item: {:#}", e);
            ORCHESTRATION_FAILURE_EXIT_CODE
        }
    }
}

async fn prepare(args: WorkItemArgs) -> Result<(Coordinator, WorkItemRequest)> {
    let settings = resolve_settings(
        args.config_file.as_deref(),
        args.settings,
        &args.setting_overrides,
    )
    .await?;

    let reporter = create_from_endpoint(&EventEndpoint::parse(&settings.event_uri)?)?;
    let target = sink_target(&settings).await?;
    let sink = ArtifactSink::new(target, reporter.clone());

    let request = WorkItemRequest {
        test_dll: args.test_dll,
        assembly_list: resolve_assembly_list(
            args.assembly_list,
            std::env::var_os(ASSEMBLY_LIST_ENV_VAR),
        ),
        xunit_test_type: args.xunit_test_type,
        framework_in_tpa: args.framework_in_tpa,
        perf_runner: args.perf_runner,
    };

    Ok((Coordinator::new(settings, sink, reporter), request))
}

/// Layer the settings file, explicit options and `name=value` overrides
async fn resolve_settings(
    config_file: Option<&std::path::Path>,
    options: SettingsLayer,
    overrides: &[String],
) -> Result<Settings> {
    let base = match config_file {
        Some(path) => SettingsLayer::load(path).await?,
        None => SettingsLayer::default(),
    };

    let mut layer = base.merge(options);
    for pair in overrides {
        layer.apply_setting(pair)?;
    }
    layer.into_settings()
}

/// The explicit option wins over the environment variable
fn resolve_assembly_list(explicit: Option<PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        info!("Using assembly list from --assemblylist: {}", path.display());
        return Some(path);
    }

    let path = env.filter(|v| !v.is_empty()).map(PathBuf::from)?;
    info!(
        "Using assembly list from {}: {}",
        ASSEMBLY_LIST_ENV_VAR,
        path.display()
    );
    Some(path)
}

async fn sink_target(settings: &Settings) -> Result<SinkTarget> {
    match Destination::parse(&settings.output_uri)? {
        Destination::Local(dir) => Ok(SinkTarget::Local(dir)),
        Destination::Remote(remote) => {
            // Load AWS config (needed for S3 access)
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = &settings.output_region {
                loader = loader.region(Region::new(region.clone()));
            }
            let aws_config = loader.load().await;

            let s3_client = Arc::new(S3Client::new(&aws_config));
            Ok(SinkTarget::Remote(Arc::new(S3UploadClient::new(
                s3_client, remote,
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> SettingsLayer {
        SettingsLayer {
            workitem_id: Some("wi-cli".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_settings_precedence() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("settings.json");
        std::fs::write(
            &config,
            r#"{
                "workitem_id": "wi-file",
                "correlation_id": "corr-file",
                "workitem_working_dir": "/work",
                "correlation_payload_dir": "/payload",
                "output_uri": "/out",
                "event_uri": "/events.jsonl"
            }"#,
        )
        .unwrap();

        let settings = resolve_settings(
            Some(&config),
            options(),
            &["correlation_id=corr-override".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(settings.workitem_id, "wi-cli");
        assert_eq!(settings.workitem_friendly_name, "wi-cli");
        assert_eq!(settings.correlation_id, "corr-override");
        assert_eq!(settings.output_uri, "/out");
    }

    #[tokio::test]
    async fn test_incomplete_settings_fail() {
        let result = resolve_settings(None, options(), &[]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_assembly_list_sources() {
        assert_eq!(
            resolve_assembly_list(
                Some(PathBuf::from("cli.json")),
                Some(OsString::from("env.json"))
            ),
            Some(PathBuf::from("cli.json"))
        );
        assert_eq!(
            resolve_assembly_list(None, Some(OsString::from("env.json"))),
            Some(PathBuf::from("env.json"))
        );
        assert_eq!(resolve_assembly_list(None, Some(OsString::new())), None);
        assert_eq!(resolve_assembly_list(None, None), None);
    }

    #[tokio::test]
    async fn test_unparseable_event_uri_exits_with_sentinel() {
        let args = WorkItemArgs {
            settings: SettingsLayer {
                workitem_id: Some("wi-1".to_string()),
                correlation_id: Some("corr-1".to_string()),
                workitem_working_dir: Some("/work".to_string()),
                correlation_payload_dir: Some("/payload".to_string()),
                output_uri: Some("/out".to_string()),
                event_uri: Some("ftp://events.example.com/x".to_string()),
                ..Default::default()
            },
            test_dll: PathBuf::from("Tests.dll"),
            xunit_test_type: "netcore".to_string(),
            ..Default::default()
        };

        assert_eq!(run_work_item(args).await, ORCHESTRATION_FAILURE_EXIT_CODE);
    }
}
