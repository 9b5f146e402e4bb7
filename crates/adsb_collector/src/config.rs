use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    // Feed configuration
    /// SBS-1/BaseStation feed host
    #[serde(default = "default_feed_host")]
    pub feed_host: String,

    /// SBS-1/BaseStation feed port
    #[serde(default = "default_feed_port")]
    pub feed_port: u16,

    /// Station identifier stamped on every published event
    #[serde(default = "default_source_id")]
    pub source_id: String,

    /// Delay between feed reconnect attempts in seconds
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Feed connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    // Pipeline configuration
    /// Interval between periodic sink flushes in seconds
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Backoff applied to a sink after a transient failure in seconds
    #[serde(default = "default_sink_retry_delay_secs")]
    pub sink_retry_delay_secs: u64,

    /// Path to the aircraft reference file; unset means no enrichment
    #[serde(default)]
    pub aircraft_db_path: Option<String>,

    // History sink
    #[serde(default = "default_history_enabled")]
    pub history_enabled: bool,

    #[serde(default = "default_history_csv_path")]
    pub history_csv_path: String,

    /// Flush the history writer every N rows
    #[serde(default = "default_history_flush_every")]
    pub history_flush_every: usize,

    // Snapshot sink
    #[serde(default = "default_snapshot_enabled")]
    pub snapshot_enabled: bool,

    #[serde(default = "default_snapshot_csv_path")]
    pub snapshot_csv_path: String,

    /// Rewrite the snapshot file every N accepted events
    #[serde(default = "default_snapshot_write_every")]
    pub snapshot_write_every: usize,

    // PostgreSQL sink
    #[serde(default)]
    pub postgres_enabled: bool,

    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Rows buffered per database transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    // NATS sink
    #[serde(default)]
    pub nats_enabled: bool,

    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    #[serde(default = "default_nats_subject")]
    pub nats_subject: String,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

// Feed defaults
fn default_feed_host() -> String {
    "127.0.0.1".to_string()
}

fn default_feed_port() -> u16 {
    30003
}

fn default_source_id() -> String {
    "UNKNOWN_SOURCE".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    10
}

// Pipeline defaults
fn default_flush_interval_secs() -> u64 {
    5
}

fn default_sink_retry_delay_secs() -> u64 {
    5
}

// History defaults
fn default_history_enabled() -> bool {
    true
}

fn default_history_csv_path() -> String {
    "output/adsb_history.csv".to_string()
}

fn default_history_flush_every() -> usize {
    10
}

// Snapshot defaults
fn default_snapshot_enabled() -> bool {
    true
}

fn default_snapshot_csv_path() -> String {
    "output/adsb_current.csv".to_string()
}

fn default_snapshot_write_every() -> usize {
    5
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "adsb".to_string()
}

fn default_postgres_username() -> String {
    "adsb".to_string()
}

fn default_postgres_password() -> String {
    "adsb".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

fn default_batch_size() -> usize {
    200
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_subject() -> String {
    "adsb.position.v1".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("ADSB"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_the_original_deployment() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::remove_var("ADSB_FEED_PORT");
        std::env::remove_var("ADSB_SOURCE_ID");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.feed_host, "127.0.0.1");
        assert_eq!(config.feed_port, 30003);
        assert_eq!(config.source_id, "UNKNOWN_SOURCE");
        assert_eq!(config.history_flush_every, 10);
        assert_eq!(config.snapshot_write_every, 5);
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.nats_subject, "adsb.position.v1");
        assert!(config.history_enabled);
        assert!(config.snapshot_enabled);
        assert!(!config.postgres_enabled);
        assert!(!config.nats_enabled);
        assert!(config.aircraft_db_path.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("ADSB_FEED_PORT", "30103");
        std::env::set_var("ADSB_SOURCE_ID", "LIML-1");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.feed_port, 30103);
        assert_eq!(config.source_id, "LIML-1");

        std::env::remove_var("ADSB_FEED_PORT");
        std::env::remove_var("ADSB_SOURCE_ID");
    }
}
