use anyhow::{Result, bail};
use std::fmt;

/// Flavor of xunit runner requested for the work item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum XunitTestType {
    #[default]
    NetCore,
    Desktop,
}

impl XunitTestType {
    /// Parse the `--xunit-test-type` tag (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "netcore" => Ok(XunitTestType::NetCore),
            "desktop" => Ok(XunitTestType::Desktop),
            _ => bail!(
                "Unsupported xunit test type: {}. Supported types: netcore, desktop",
                s
            ),
        }
    }

    /// Reject runner flavors the host cannot execute
    pub fn ensure_supported_on(self, host: HostPlatform) -> Result<()> {
        if self == XunitTestType::Desktop && host != HostPlatform::Windows {
            bail!("Cannot run desktop xunit on non windows platforms");
        }
        Ok(())
    }
}

impl fmt::Display for XunitTestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XunitTestType::NetCore => f.write_str("netcore"),
            XunitTestType::Desktop => f.write_str("desktop"),
        }
    }
}

/// Operating system family of the host running the work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    Other,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Other
        }
    }
}
