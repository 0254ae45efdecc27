use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{Instrument, error, info, info_span, warn};

use super::executor::{self, RunnerInvocation};
use super::platform::{HostPlatform, XunitTestType};
use super::results::{self, results_path};
use super::sink::ArtifactSink;
use super::stager::EnvironmentStager;
use crate::config::{ASSEMBLY_LIST_ENV_VAR, ERROR_LOG_FILE_NAME, ORCHESTRATION_FAILURE_EXIT_CODE};
use crate::error::PipelineError;
use crate::settings::Settings;
use crate::telemetry::{Event, EventReporter};

/// What to run for the work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemRequest {
    /// Target test module, relative to the work item root
    pub test_dll: PathBuf,
    /// Assembly manifest, relative to the work item root
    pub assembly_list: Option<PathBuf>,
    /// Raw `--xunit-test-type` tag
    pub xunit_test_type: String,
    pub framework_in_tpa: bool,
    pub perf_runner: Option<String>,
}

/// The Coordinator runs one work item through the pipeline.
///
/// It owns the single catch boundary: every stage returns a `PipelineError`
/// and `run` turns any of them into one error log, one publish attempt and
/// one `XUnitTestFailure` event.
pub struct Coordinator {
    settings: Settings,
    sink: ArtifactSink,
    reporter: Arc<dyn EventReporter>,
    host: HostPlatform,
}

impl Coordinator {
    /// Create a new Coordinator instance
    pub fn new(settings: Settings, sink: ArtifactSink, reporter: Arc<dyn EventReporter>) -> Self {
        Self {
            settings,
            sink,
            reporter,
            host: HostPlatform::current(),
        }
    }

    /// Override the detected host platform
    pub fn with_host_platform(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    /// Run the work item and return the process exit code
    ///
    /// On success this is the runner's own exit code. Any failure yields
    /// [`ORCHESTRATION_FAILURE_EXIT_CODE`].
    pub async fn run(&self, request: &WorkItemRequest) -> i32 {
        let span = info_span!(
            "work_item",
            id = %self.settings.workitem_id,
            correlation_id = %self.settings.correlation_id
        );

        async {
            match self.execute(request).await {
                Ok(exit_code) => exit_code,
                Err(e) => self.report_failure(&e).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Sequence the pipeline:
    /// 1. Check the runner type against the host
    /// 2. Stage the execution directory
    /// 3. Run the runner
    /// 4. Extract the result summary
    /// 5. Publish results and send the completion event
    async fn execute(&self, request: &WorkItemRequest) -> Result<i32, PipelineError> {
        info!("Running on '{}'", host_name());

        // 1. Configuration
        let assembly_list = self
            .check_configuration(request)
            .map_err(PipelineError::Configuration)?;

        // 2. Staging
        let staged = EnvironmentStager::new(&self.settings)
            .stage(&assembly_list)
            .await
            .map_err(PipelineError::Staging)?;

        // 3. Executing
        let invocation =
            RunnerInvocation::for_work_item(&staged.runner_dir, &staged.root, &request.test_dll);
        let outcome = executor::run(&invocation)
            .await
            .map_err(PipelineError::Execution)?;

        // 4. Extracting; the result file decides success, not the exit code
        let summary = results::extract(&staged.root)
            .await
            .map_err(PipelineError::Extraction)?
            .ok_or_else(|| PipelineError::MissingResult {
                path: results_path(&staged.root),
            })?;

        // 5. Reporting
        info!("Uploading results from {}", summary.path.display());
        let results_uri = self
            .sink
            .publish(&self.settings, &summary.path)
            .await
            .map_err(PipelineError::Reporting)?;

        info!("Sending completion event");
        self.reporter
            .send(&Event::test_result(
                &self.settings,
                results_uri,
                summary.test_count,
            ))
            .await
            .map_err(PipelineError::Reporting)?;

        Ok(outcome.exit_code.unwrap_or_else(|| {
            warn!("Runner was terminated without an exit code");
            ORCHESTRATION_FAILURE_EXIT_CODE
        }))
    }

    /// Validate the request before anything touches the filesystem
    fn check_configuration(&self, request: &WorkItemRequest) -> Result<PathBuf> {
        let test_type = XunitTestType::parse(&request.xunit_test_type)?;
        test_type.ensure_supported_on(self.host)?;

        if request.framework_in_tpa {
            info!("Framework assemblies are loaded from the TPA list");
        }
        if let Some(perf_runner) = &request.perf_runner {
            info!("Perf runner '{}' requested", perf_runner);
        }

        request.assembly_list.clone().ok_or_else(|| {
            anyhow!(
                "No assembly list given: pass --assemblylist or set {}",
                ASSEMBLY_LIST_ENV_VAR
            )
        })
    }

    /// Uniform failure handling: error log, publish, failure event
    ///
    /// Nothing here is allowed to fail the process; secondary errors are
    /// logged and the sentinel exit code is still returned.
    async fn report_failure(&self, failure: &PipelineError) -> i32 {
        let report = failure.report();
        error!("Error running xunit ({}): {}", failure.kind(), report);

        let error_path = self.settings.workitem_working_dir.join(ERROR_LOG_FILE_NAME);
        let error_uri = match write_error_log(&error_path, &report).await {
            Ok(()) => match self.sink.publish(&self.settings, &error_path).await {
                Ok(uri) => uri,
                Err(e) => {
                    warn!("Failed to publish error log: {:#}", e);
                    None
                }
            },
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        };

        info!("Sending test failure event");
        if let Err(e) = self
            .reporter
            .send(&Event::test_failure(&self.settings, error_uri))
            .await
        {
            warn!("Failed to send test failure event: {:#}", e);
        }

        failure.exit_code()
    }
}

async fn write_error_log(path: &Path, report: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .context("Failed to create work item directory for error log")?;
    }
    fs::write(path, report)
        .await
        .with_context(|| format!("Failed to write error log {}", path.display()))
}

fn host_name() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "<unknown>".to_string())
}
