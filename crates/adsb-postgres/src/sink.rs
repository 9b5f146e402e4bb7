use adsb_domain::{EventSink, PositionEvent, SinkError, SinkResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::PostgresClient;

const UPSERT_AIRCRAFT: &str = "INSERT INTO aircraft (icao, first_seen_utc, last_seen_utc, last_flight)
     VALUES ($1, $2, $3, $4)
     ON CONFLICT (icao) DO UPDATE SET
         last_seen_utc = EXCLUDED.last_seen_utc,
         last_flight   = COALESCE(EXCLUDED.last_flight, aircraft.last_flight)";

const INSERT_POSITION: &str = "INSERT INTO positions (icao, ts, lat, lon, altitude_ft, speed_kts, heading_deg, squawk)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

#[derive(Debug, Clone)]
struct AircraftRow {
    icao: String,
    seen_utc: DateTime<Utc>,
    flight: Option<String>,
}

#[derive(Debug, Clone)]
struct PositionRecord {
    icao: String,
    ts: DateTime<Utc>,
    lat: f64,
    lon: f64,
    altitude_ft: Option<i32>,
    speed_kts: Option<f32>,
    heading_deg: Option<f32>,
    squawk: Option<String>,
}

impl From<&PositionEvent> for AircraftRow {
    fn from(event: &PositionEvent) -> Self {
        Self {
            icao: event.aircraft.icao_hex.clone(),
            seen_utc: event.received_at,
            flight: event.aircraft.callsign.clone(),
        }
    }
}

impl From<&PositionEvent> for PositionRecord {
    fn from(event: &PositionEvent) -> Self {
        Self {
            icao: event.aircraft.icao_hex.clone(),
            ts: event.received_at,
            lat: event.position.lat,
            lon: event.position.lon,
            altitude_ft: event.position.altitude_ft,
            // speed_kts and heading_deg are REAL columns
            speed_kts: event.position.ground_speed_kts.map(|v| v as f32),
            heading_deg: event.position.track_deg.map(|v| v as f32),
            squawk: event.codes.squawk.clone(),
        }
    }
}

#[derive(Default)]
struct PendingBatch {
    aircraft: Vec<AircraftRow>,
    positions: Vec<PositionRecord>,
}

/// Batched writer for the aircraft and positions tables.
///
/// Each accepted envelope buffers one aircraft upsert and one position
/// insert. The batch is committed in a single transaction once it reaches
/// `batch_size` rows, and on every `flush()`. A failed commit leaves the
/// buffer intact so the rows go out with the next attempt.
pub struct RelationalSink {
    client: PostgresClient,
    pending: Mutex<PendingBatch>,
    batch_size: usize,
}

impl RelationalSink {
    pub fn new(client: PostgresClient, batch_size: usize) -> Self {
        Self {
            client,
            pending: Mutex::new(PendingBatch::default()),
            batch_size: batch_size.max(1),
        }
    }

    async fn commit(&self, batch: &mut PendingBatch) -> SinkResult<()> {
        if batch.aircraft.is_empty() && batch.positions.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(SinkError::transient)?;
        let tx = conn.transaction().await.map_err(classify)?;

        // Aircraft rows must land before positions satisfy the FK. Row-wise
        // execution keeps repeated ICAOs within a batch valid for the upsert.
        for row in &batch.aircraft {
            tx.execute(
                UPSERT_AIRCRAFT,
                &[&row.icao, &row.seen_utc, &row.seen_utc, &row.flight],
            )
            .await
            .map_err(classify)?;
        }
        for row in &batch.positions {
            tx.execute(
                INSERT_POSITION,
                &[
                    &row.icao,
                    &row.ts,
                    &row.lat,
                    &row.lon,
                    &row.altitude_ft,
                    &row.speed_kts,
                    &row.heading_deg,
                    &row.squawk,
                ],
            )
            .await
            .map_err(classify)?;
        }

        let committed = batch.positions.len();
        tx.commit().await.map_err(classify)?;
        batch.aircraft.clear();
        batch.positions.clear();
        debug!(rows = committed, "committed position batch");
        Ok(())
    }
}

#[async_trait]
impl EventSink for RelationalSink {
    fn name(&self) -> &'static str {
        "relational"
    }

    async fn accept(&self, event: &PositionEvent) -> SinkResult<()> {
        let mut pending = self.pending.lock().await;
        pending.aircraft.push(AircraftRow::from(event));
        pending.positions.push(PositionRecord::from(event));
        if pending.positions.len() >= self.batch_size {
            self.commit(&mut pending).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        let mut pending = self.pending.lock().await;
        self.commit(&mut pending).await
    }

    async fn close(&self) -> SinkResult<()> {
        self.flush().await
    }
}

fn classify(err: tokio_postgres::Error) -> SinkError {
    match err.as_db_error() {
        Some(db_err) if is_persistent_class(db_err.code().code()) => {
            SinkError::persistent(err)
        }
        // Connection loss and everything else server-side transient
        _ => SinkError::transient(err),
    }
}

/// SQLSTATE classes that retrying cannot fix: 42 (syntax/undefined object),
/// 53 (insufficient resources), 3D (invalid catalog), 3F (invalid schema).
fn is_persistent_class(code: &str) -> bool {
    matches!(&code[..2.min(code.len())], "42" | "53" | "3D" | "3F")
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsb_domain::{Aircraft, Codes, Position, RawMessage, EVENT_TYPE};
    use chrono::TimeZone;

    fn event() -> PositionEvent {
        PositionEvent {
            event_type: EVENT_TYPE.to_string(),
            source: "TEST".to_string(),
            received_at: Utc.timestamp_millis_opt(1_765_127_000_000).unwrap(),
            aircraft: Aircraft {
                icao_hex: "3C5EF2".to_string(),
                callsign: Some("EWG4TV".to_string()),
                registration: None,
                icao_type: None,
                model: None,
                is_military: None,
                is_interesting: None,
                is_pia: None,
                is_ladd: None,
            },
            position: Position {
                lat: 45.63,
                lon: 8.936,
                altitude_ft: Some(38000),
                ground_speed_kts: Some(376.0),
                track_deg: Some(158.0),
                vertical_rate_fpm: None,
            },
            codes: Codes {
                squawk: Some("1000".to_string()),
                ..Codes::default()
            },
            raw: RawMessage {
                sbs: "MSG,3".to_string(),
                message_type: "MSG".to_string(),
                transmission_type: Some(3),
            },
        }
    }

    #[test]
    fn aircraft_row_takes_callsign_and_receipt_time() {
        let row = AircraftRow::from(&event());
        assert_eq!(row.icao, "3C5EF2");
        assert_eq!(row.flight.as_deref(), Some("EWG4TV"));
        assert_eq!(row.seen_utc.timestamp_millis(), 1_765_127_000_000);
    }

    #[test]
    fn position_record_narrows_real_columns() {
        let rec = PositionRecord::from(&event());
        assert_eq!(rec.speed_kts, Some(376.0f32));
        assert_eq!(rec.heading_deg, Some(158.0f32));
        assert_eq!(rec.altitude_ft, Some(38000));
        assert_eq!(rec.squawk.as_deref(), Some("1000"));
    }

    #[test]
    fn sqlstate_classes_split_persistent_from_transient() {
        assert!(is_persistent_class("42P01"));
        assert!(is_persistent_class("53100"));
        assert!(is_persistent_class("3D000"));
        assert!(is_persistent_class("3F000"));
        assert!(!is_persistent_class("08006"));
        assert!(!is_persistent_class("23505"));
        assert!(!is_persistent_class(""));
    }
}
