use adsb_domain::{Aircraft, Codes, Position, PositionEvent, RawMessage, EVENT_TYPE};
use chrono::{TimeZone, Utc};

pub(crate) fn event(icao: &str, lat: f64, lon: f64, ts_ms: i64) -> PositionEvent {
    PositionEvent {
        event_type: EVENT_TYPE.to_string(),
        source: "TEST".to_string(),
        received_at: Utc.timestamp_millis_opt(ts_ms).unwrap(),
        aircraft: Aircraft {
            icao_hex: icao.to_string(),
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
            lat,
            lon,
            altitude_ft: Some(38000),
            ground_speed_kts: Some(376.0),
            track_deg: None,
            vertical_rate_fpm: None,
        },
        codes: Codes::default(),
        raw: RawMessage {
            sbs: "MSG,3".to_string(),
            message_type: "MSG".to_string(),
            transmission_type: Some(3),
        },
    }
}
