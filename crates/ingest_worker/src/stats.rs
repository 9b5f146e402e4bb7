use tracing::info;

/// Progress counters for the pipeline, logged on every flush tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub accepted: u64,
    pub unsupported: u64,
    pub missing_key: u64,
    pub no_position: u64,
    pub malformed: u64,
    pub sink_skipped: u64,
}

impl ParseStats {
    pub fn log(&self) {
        info!(
            accepted = self.accepted,
            unsupported = self.unsupported,
            missing_key = self.missing_key,
            no_position = self.no_position,
            malformed = self.malformed,
            sink_skipped = self.sink_skipped,
            "pipeline progress"
        );
    }
}
