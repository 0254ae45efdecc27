//! Structured events sent to the telemetry endpoint

pub mod event;
pub mod reporter;

pub use event::Event;
pub use reporter::{EventReporter, FileEventReporter, HttpEventReporter, create_from_endpoint};
