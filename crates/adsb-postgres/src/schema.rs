use anyhow::{Context, Result};
use tracing::info;

use crate::client::PostgresClient;

const DDL_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS aircraft (
        icao TEXT PRIMARY KEY,
        first_seen_utc TIMESTAMPTZ NOT NULL,
        last_seen_utc  TIMESTAMPTZ NOT NULL,
        last_flight    TEXT
    )",
    "CREATE TABLE IF NOT EXISTS positions (
        id BIGSERIAL PRIMARY KEY,
        icao TEXT NOT NULL REFERENCES aircraft(icao),
        ts   TIMESTAMPTZ NOT NULL,
        lat  DOUBLE PRECISION NOT NULL,
        lon  DOUBLE PRECISION NOT NULL,
        altitude_ft INTEGER,
        speed_kts   REAL,
        heading_deg REAL,
        squawk      TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_positions_ts ON positions(ts)",
    "CREATE INDEX IF NOT EXISTS idx_positions_icao_ts ON positions(icao, ts)",
];

/// Creates tables and indexes if they don't exist.
pub async fn ensure_schema(client: &PostgresClient) -> Result<()> {
    let conn = client
        .get_connection()
        .await
        .context("failed to get connection for schema bootstrap")?;

    for ddl in DDL_STATEMENTS {
        conn.execute(*ddl, &[])
            .await
            .with_context(|| format!("failed to execute DDL: {}", ddl.lines().next().unwrap_or("")))?;
    }

    info!("database schema ensured");
    Ok(())
}
