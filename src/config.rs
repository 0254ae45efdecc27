//! Configuration constants for the work-item runner
//!
//! This module centralizes the fixed file names, directory layout and tunables
//! used throughout the pipeline.

use std::time::Duration;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit code reported for any failure of the pipeline itself
///
/// The wrapped xunit runner only ever returns 0-4, so 5 is always
/// distinguishable from a runner-reported failure.
pub const ORCHESTRATION_FAILURE_EXIT_CODE: i32 = 5;

// ============================================================================
// Work Item Layout
// ============================================================================

/// Result file the runner writes into the work item root
pub const RESULTS_FILE_NAME: &str = "test_results.xml";

/// Diagnostics file written by the failure handler
pub const ERROR_LOG_FILE_NAME: &str = "error.log";

/// Subdirectory of the work item root that receives the runner tree
pub const RUNNER_DIR: &str = "runner";

/// Runner executable inside [`RUNNER_DIR`]
pub const RUNNER_EXECUTABLE: &str = "xunit.console.uwp.exe";

/// Argument naming the install location passed to the runner
pub const INSTALL_LOCATION_ARG: &str = "-installlocation";

// ============================================================================
// Correlation Payload Layout
// ============================================================================

/// App tooling tree copied into the work item root
pub const APP_TOOLS_PAYLOAD_DIR: &str = "UWPAppTools";

/// Runner tree copied into [`RUNNER_DIR`]
pub const RUNNER_PAYLOAD_DIR: &str = "UWPRunner";

// ============================================================================
// Environment
// ============================================================================

/// Fallback source for the assembly list when `--assemblylist` is absent
pub const ASSEMBLY_LIST_ENV_VAR: &str = "HELIX_ASSEMBLY_LIST";

// ============================================================================
// Upload Configuration
// ============================================================================

/// Number of attempts an upload gets before it is reported as failed
pub const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Base delay between upload attempts, multiplied by the attempt number
pub const UPLOAD_RETRY_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// Event Configuration
// ============================================================================

/// Timeout for a single event POST
pub const EVENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
