//! Failure kinds that reach the orchestrator's single catch boundary

use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ORCHESTRATION_FAILURE_EXIT_CODE;

/// Any failure of the work item pipeline
///
/// Each stage wraps its cause in the matching kind and returns it with `?`;
/// the orchestrator is the only place that handles it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid runner type / platform combination or unusable settings
    #[error("configuration error: {0}")]
    Configuration(#[source] anyhow::Error),

    /// Manifest missing or malformed, or a payload file could not be copied
    #[error("staging failed: {0}")]
    Staging(#[source] anyhow::Error),

    /// The runner process could not be launched or waited on
    #[error("runner execution failed: {0}")]
    Execution(#[source] anyhow::Error),

    /// The result file exists but could not be read
    #[error("reading results failed: {0}")]
    Extraction(#[source] anyhow::Error),

    /// The runner finished but left no result file
    #[error("No exception thrown, but XUnit results not created at {}", path.display())]
    MissingResult { path: PathBuf },

    /// Publishing results or sending the completion event failed
    #[error("reporting results failed: {0}")]
    Reporting(#[source] anyhow::Error),
}

impl PipelineError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        ORCHESTRATION_FAILURE_EXIT_CODE
    }

    /// Short name of the failure kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "ConfigurationError",
            PipelineError::Staging(_) => "StagingError",
            PipelineError::Execution(_) => "ExecutionError",
            PipelineError::Extraction(_) => "ExtractionError",
            PipelineError::MissingResult { .. } => "MissingResultError",
            PipelineError::Reporting(_) => "ReportingError",
        }
    }

    /// Full report written to the error log: message, cause chain and backtrace
    pub fn report(&self) -> String {
        let mut report = format!("Unhandled error: {}\n", self);

        let cause = match self {
            PipelineError::Configuration(e)
            | PipelineError::Staging(e)
            | PipelineError::Execution(e)
            | PipelineError::Extraction(e)
            | PipelineError::Reporting(e) => Some(e),
            PipelineError::MissingResult { .. } => None,
        };

        if let Some(cause) = cause {
            let mut chain = cause.chain().skip(1).peekable();
            if chain.peek().is_some() {
                report.push_str("\nCaused by:\n");
                for (i, source) in chain.enumerate() {
                    let _ = writeln!(report, "    {}: {}", i, source);
                }
            }
            let backtrace = cause.backtrace();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                let _ = write!(report, "\nStack backtrace:\n{}", backtrace);
            }
        } else {
            let backtrace = std::backtrace::Backtrace::capture();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                let _ = write!(report, "\nStack backtrace:\n{}", backtrace);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_every_kind_maps_to_sentinel_exit_code() {
        let errors = vec![
            PipelineError::Configuration(anyhow::anyhow!("bad")),
            PipelineError::Staging(anyhow::anyhow!("bad")),
            PipelineError::Execution(anyhow::anyhow!("bad")),
            PipelineError::Extraction(anyhow::anyhow!("bad")),
            PipelineError::MissingResult {
                path: PathBuf::from("/work/test_results.xml"),
            },
            PipelineError::Reporting(anyhow::anyhow!("bad")),
        ];

        for err in errors {
            assert_eq!(err.exit_code(), 5, "{}", err.kind());
        }
    }

    #[test]
    fn test_report_includes_cause_chain() {
        let root: anyhow::Result<()> =
            Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
        let err = root
            .context("Failed to copy payload/xunit.core.dll")
            .unwrap_err();

        let report = PipelineError::Staging(err).report();
        assert!(report.starts_with("Unhandled error: staging failed: Failed to copy"));
        assert!(report.contains("Caused by:"));
        assert!(report.contains("entity not found"));
    }

    #[test]
    fn test_extraction_kind() {
        let err = PipelineError::Extraction(anyhow::anyhow!("Failed to read result file"));
        assert_eq!(err.kind(), "ExtractionError");
        assert!(err.report().contains("reading results failed"));
    }

    #[test]
    fn test_missing_result_report() {
        let err = PipelineError::MissingResult {
            path: PathBuf::from("/work/test_results.xml"),
        };
        assert_eq!(err.kind(), "MissingResultError");
        assert!(
            err.report()
                .contains("No exception thrown, but XUnit results not created")
        );
    }
}
