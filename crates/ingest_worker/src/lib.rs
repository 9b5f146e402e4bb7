//! The ingest pipeline: pulls feed lines, parses them into position events
//! and fans each event out to the configured sinks with per-sink failure
//! isolation.

mod dispatcher;
mod source;
mod stats;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use source::LineSource;
pub use stats::ParseStats;
