use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{INSTALL_LOCATION_ARG, RUNNER_EXECUTABLE};
use crate::io::LossyLines;

/// A single runner invocation against one test module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInvocation {
    pub executable: PathBuf,
    pub test_module: PathBuf,
    /// Work item root; also the runner's working directory
    pub install_location: PathBuf,
}

impl RunnerInvocation {
    /// Invocation of the staged runner against `test_dll` in the work item root
    pub fn for_work_item(runner_dir: &Path, workitem_dir: &Path, test_dll: &Path) -> Self {
        Self {
            executable: runner_dir.join(RUNNER_EXECUTABLE),
            test_module: workitem_dir.join(test_dll),
            install_location: workitem_dir.to_path_buf(),
        }
    }

    /// Arguments passed to the runner
    pub fn args(&self) -> Vec<OsString> {
        vec![
            self.test_module.clone().into_os_string(),
            OsString::from(INSTALL_LOCATION_ARG),
            self.install_location.clone().into_os_string(),
        ]
    }
}

/// What the runner process left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, or None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, in arrival order
    pub output: Vec<String>,
}

/// Launch the runner and wait for it to exit
///
/// The exit status is captured but not interpreted. There is no retry and no
/// timeout; a hung runner blocks until the process is killed from outside.
pub async fn run(invocation: &RunnerInvocation) -> Result<ProcessOutcome> {
    info!(
        "Starting xunit against '{}'",
        invocation.test_module.display()
    );

    let mut child = Command::new(&invocation.executable)
        .args(invocation.args())
        .current_dir(&invocation.install_location)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| {
            format!(
                "Failed to launch runner {}",
                invocation.executable.display()
            )
        })?;

    let mut stdout = LossyLines::new(child.stdout.take().context("Runner stdout not captured")?);
    let mut stderr = LossyLines::new(child.stderr.take().context("Runner stderr not captured")?);
    let (mut stdout_open, mut stderr_open) = (true, true);
    let mut output = Vec::new();

    while stdout_open || stderr_open {
        tokio::select! {
            line = stdout.next_line(), if stdout_open => {
                match line.context("Failed to read runner stdout")? {
                    Some(line) => {
                        info!("{}", line);
                        output.push(line);
                    }
                    None => stdout_open = false,
                }
            }
            line = stderr.next_line(), if stderr_open => {
                match line.context("Failed to read runner stderr")? {
                    Some(line) => {
                        warn!("{}", line);
                        output.push(line);
                    }
                    None => stderr_open = false,
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .context("Failed to wait for runner process")?;

    let outcome = ProcessOutcome {
        exit_code: status.code(),
        output,
    };
    info!("Runner exited with {}", status);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invocation_layout() {
        let invocation = RunnerInvocation::for_work_item(
            Path::new("/work/runner"),
            Path::new("/work"),
            Path::new("System.Runtime.Tests.dll"),
        );

        assert_eq!(
            invocation.executable,
            PathBuf::from("/work/runner/xunit.console.uwp.exe")
        );
        assert_eq!(
            invocation.args(),
            vec![
                OsString::from("/work/System.Runtime.Tests.dll"),
                OsString::from("-installlocation"),
                OsString::from("/work"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_executable_fails_to_launch() {
        let dir = TempDir::new().unwrap();
        let invocation = RunnerInvocation::for_work_item(
            &dir.path().join("runner"),
            dir.path(),
            Path::new("Tests.dll"),
        );

        let err = run(&invocation).await.unwrap_err();
        assert!(err.to_string().contains("Failed to launch runner"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let runner_dir = dir.path().join("runner");
        std::fs::create_dir_all(&runner_dir).unwrap();
        let script = runner_dir.join(RUNNER_EXECUTABLE);
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"module=$1\"\necho \"flag=$2\" >&2\npwd\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let invocation =
            RunnerInvocation::for_work_item(&runner_dir, dir.path(), Path::new("Tests.dll"));
        let outcome = run(&invocation).await.unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        let module_line = format!("module={}", dir.path().join("Tests.dll").display());
        assert!(outcome.output.contains(&module_line));
        assert!(outcome.output.contains(&"flag=-installlocation".to_string()));
        assert_eq!(outcome.output.len(), 3);
    }
}
