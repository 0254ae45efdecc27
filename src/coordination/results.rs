use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs::{self, File};
use tokio::io::AsyncRead;
use tracing::{info, warn};

use crate::config::RESULTS_FILE_NAME;
use crate::io::LossyLines;

const ASSEMBLY_MARKER: &str = "<assembly ";

static TOTAL_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"total="(\d+)""#).expect("total attribute pattern is valid"));

/// Summary of a result file the runner produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSummary {
    pub path: PathBuf,
    pub test_count: u64,
}

/// Location of the runner's result file for a work item
pub fn results_path(workitem_dir: &Path) -> PathBuf {
    workitem_dir.join(RESULTS_FILE_NAME)
}

/// Look for the result file and read its test count
///
/// Returns None when the file does not exist. A file without a summary line
/// still yields a summary, with a count of zero.
pub async fn extract(workitem_dir: &Path) -> Result<Option<ResultSummary>> {
    let path = results_path(workitem_dir);

    if !fs::try_exists(&path)
        .await
        .context("Failed to check for result file")?
    {
        return Ok(None);
    }

    let file = File::open(&path)
        .await
        .with_context(|| format!("Failed to open result file {}", path.display()))?;
    let test_count = read_test_count(file)
        .await
        .with_context(|| format!("Failed to read result file {}", path.display()))?;

    info!(
        "Found results at {} with {} tests",
        path.display(),
        test_count
    );
    Ok(Some(ResultSummary { path, test_count }))
}

/// Scan for the first `<assembly ...>` line carrying a `total` attribute
///
/// Stops at the first match; zero if no line matches. A total too large for
/// a `u64` saturates.
pub async fn read_test_count<R: AsyncRead + Unpin>(reader: R) -> Result<u64> {
    let mut lines = LossyLines::new(reader);

    while let Some(line) = lines.next_line().await? {
        if let Some(total) = parse_total(&line) {
            return Ok(total.parse().unwrap_or_else(|_| {
                warn!("Test total '{}' out of range, reporting {}", total, u64::MAX);
                u64::MAX
            }));
        }
    }

    Ok(0)
}

fn parse_total(line: &str) -> Option<&str> {
    if !line.contains(ASSEMBLY_MARKER) {
        return None;
    }
    TOTAL_ATTRIBUTE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
