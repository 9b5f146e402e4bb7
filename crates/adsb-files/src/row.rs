use adsb_domain::PositionEvent;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

/// One CSV row, shared between the history log and the snapshot file.
///
/// `flight` follows the original file format: empty string when unknown.
/// The remaining optionals serialize as empty fields, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRow {
    pub timestamp_utc: String,
    pub icao: String,
    pub flight: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: Option<i32>,
    pub speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub squawk: Option<String>,
}

impl From<&PositionEvent> for PositionRow {
    fn from(event: &PositionEvent) -> Self {
        Self {
            timestamp_utc: event
                .received_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            icao: event.aircraft.icao_hex.clone(),
            flight: event.aircraft.callsign.clone().unwrap_or_default(),
            lat: event.position.lat,
            lon: event.position.lon,
            altitude_ft: event.position.altitude_ft,
            speed_kts: event.position.ground_speed_kts,
            heading_deg: event.position.track_deg,
            squawk: event.codes.squawk.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::event;

    #[test]
    fn maps_event_fields_and_leaves_unknowns_empty() {
        let row = PositionRow::from(&event("3C5EF2", 45.63, 8.936, 1_765_127_000_000));
        assert_eq!(row.icao, "3C5EF2");
        assert_eq!(row.flight, "EWG4TV");
        assert_eq!(row.altitude_ft, Some(38000));
        assert_eq!(row.heading_deg, None);
        assert_eq!(row.squawk, None);
        assert!(row.timestamp_utc.ends_with('Z'));
    }
}
