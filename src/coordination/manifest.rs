use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Category of files listed in an assembly manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestCategory {
    /// Runtime host files
    CoreRun,
    /// Test framework files
    Xunit,
    /// Test dependency files
    TestDependency,
}

impl fmt::Display for ManifestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManifestCategory::CoreRun => "corerun",
            ManifestCategory::Xunit => "xunit",
            ManifestCategory::TestDependency => "testdependency",
        };
        f.write_str(name)
    }
}

/// The assembly list shipped with a work item
///
/// Each entry is a path relative to the correlation payload root, written with
/// either separator. All three keys are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub corerun: Vec<String>,
    pub xunit: Vec<String>,
    pub testdependency: Vec<String>,
}

impl AssemblyManifest {
    /// Read and parse a manifest file
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read assembly list {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse assembly list {}", path.display()))
    }

    /// Entries grouped by category, in copy order
    pub fn categories(&self) -> [(ManifestCategory, &[String]); 3] {
        [
            (ManifestCategory::CoreRun, self.corerun.as_slice()),
            (ManifestCategory::Xunit, self.xunit.as_slice()),
            (ManifestCategory::TestDependency, self.testdependency.as_slice()),
        ]
    }

    /// Total number of listed files
    pub fn len(&self) -> usize {
        self.corerun.len() + self.xunit.len() + self.testdependency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
