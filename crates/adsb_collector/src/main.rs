mod config;
mod telemetry;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use adsb_domain::{AircraftRegistry, EventSink, SbsParser};
use adsb_feed::{FeedConfig, FeedReader};
use adsb_files::{HistorySink, SnapshotSink};
use adsb_nats::{BusSink, NatsClient};
use adsb_postgres::{ensure_schema, PostgresClient, PostgresSettings, RelationalSink};
use anyhow::{Context, Result};
use config::ServiceConfig;
use ingest_worker::{Dispatcher, DispatcherConfig};
use runner::Runner;
use telemetry::{init_telemetry, TelemetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_telemetry(&TelemetryConfig {
        log_level: config.log_level.clone(),
        json: config.log_json,
    });

    info!(
        state = "Starting",
        source = %config.source_id,
        feed = %format!("{}:{}", config.feed_host, config.feed_port),
        "starting adsb collector"
    );
    debug!("Configuration: {:?}", config);

    let code = match run(config).await {
        Ok(code) => code,
        Err(e) => {
            error!("startup failed: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(config: ServiceConfig) -> Result<i32> {
    let registry = Arc::new(load_registry(&config));
    let parser = SbsParser::new(config.source_id.clone(), registry);

    let sinks = build_sinks(&config).await?;
    if sinks.is_empty() {
        warn!("no sinks enabled, events will only be counted");
    }

    let token = CancellationToken::new();
    let reader = FeedReader::new(
        FeedConfig {
            host: config.feed_host.clone(),
            port: config.feed_port,
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        },
        token.clone(),
    );

    let dispatcher = Dispatcher::new(
        parser,
        sinks,
        DispatcherConfig {
            flush_interval: Duration::from_secs(config.flush_interval_secs),
            sink_retry_delay: Duration::from_secs(config.sink_retry_delay_secs),
        },
    );

    let code = Runner::new()
        .with_cancellation_token(token)
        .with_process("dispatcher", move |ctx| dispatcher.run(reader, ctx))
        .run()
        .await;
    Ok(code)
}

/// A configured-but-unreadable reference file degrades to no enrichment
/// rather than refusing to start; position collection does not depend on it.
fn load_registry(config: &ServiceConfig) -> AircraftRegistry {
    match config.aircraft_db_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => match AircraftRegistry::load(Path::new(path)) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path, "falling back to empty aircraft registry: {e:#}");
                AircraftRegistry::empty()
            }
        },
        None => AircraftRegistry::empty(),
    }
}

async fn build_sinks(config: &ServiceConfig) -> Result<Vec<Arc<dyn EventSink>>> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let mut sinks: Vec<Arc<dyn EventSink>> = Vec::new();

    if config.history_enabled {
        let sink = HistorySink::open(
            Path::new(&config.history_csv_path),
            config.history_flush_every,
        )
        .context("failed to open history sink")?;
        info!(path = %config.history_csv_path, "history sink enabled");
        sinks.push(Arc::new(sink));
    }

    if config.snapshot_enabled {
        let sink = SnapshotSink::open(
            Path::new(&config.snapshot_csv_path),
            config.snapshot_write_every,
        )
        .context("failed to open snapshot sink")?;
        info!(path = %config.snapshot_csv_path, "snapshot sink enabled");
        sinks.push(Arc::new(sink));
    }

    if config.postgres_enabled {
        let client = PostgresClient::new(&PostgresSettings {
            host: config.postgres_host.clone(),
            port: config.postgres_port,
            database: config.postgres_database.clone(),
            username: config.postgres_username.clone(),
            password: config.postgres_password.clone(),
            max_pool_size: config.postgres_max_pool_size,
        })?;
        tokio::time::timeout(startup_timeout, client.ping())
            .await
            .context("timed out connecting to postgres")?
            .context("failed to reach postgres")?;
        ensure_schema(&client).await?;
        info!(
            host = %config.postgres_host,
            database = %config.postgres_database,
            "relational sink enabled"
        );
        sinks.push(Arc::new(RelationalSink::new(client, config.batch_size)));
    }

    if config.nats_enabled {
        let client = NatsClient::connect(&config.nats_url, startup_timeout)
            .await
            .context("failed to connect to NATS")?;
        info!(url = %config.nats_url, subject = %config.nats_subject, "bus sink enabled");
        sinks.push(Arc::new(BusSink::new(
            Arc::new(client),
            config.nats_subject.clone(),
        )));
    }

    Ok(sinks)
}
