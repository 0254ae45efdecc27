//! Work item pipeline: staging, runner execution, result extraction and reporting

pub mod coordinator;
pub mod executor;
pub mod manifest;
pub mod platform;
pub mod results;
pub mod sink;
pub mod stager;

pub use coordinator::{Coordinator, WorkItemRequest};
pub use platform::{HostPlatform, XunitTestType};
pub use sink::{ArtifactSink, SinkTarget};
