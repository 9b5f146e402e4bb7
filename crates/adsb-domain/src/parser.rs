use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::envelope::{Aircraft, Codes, Position, PositionEvent, RawMessage, EVENT_TYPE};
use crate::error::ParseFailure;
use crate::registry::AircraftRegistry;

// SBS-1/BaseStation field indices (comma-delimited, fixed by the receiver).
const IDX_MESSAGE_TYPE: usize = 0;
const IDX_TRANSMISSION_TYPE: usize = 1;
const IDX_ICAO: usize = 4;
const IDX_CALLSIGN: usize = 10;
const IDX_ALTITUDE: usize = 11;
const IDX_GROUND_SPEED: usize = 12;
const IDX_TRACK: usize = 13;
const IDX_LAT: usize = 14;
const IDX_LON: usize = 15;
const IDX_VERTICAL_RATE: usize = 16;
const IDX_SQUAWK: usize = 17;
const IDX_ALERT: usize = 18;
const IDX_EMERGENCY: usize = 19;
const IDX_SPI: usize = 20;
const IDX_ON_GROUND: usize = 21;

/// Defensive decoder of one raw SBS-1 line into a [`PositionEvent`].
///
/// Only `MSG` lines with a non-empty ICAO hex and a finite, in-range lat/lon
/// become envelopes; everything else is a counted [`ParseFailure`]. All other
/// fields are best-effort: missing or malformed values become absent, never
/// zero, and a truncated line can never panic the parser.
pub struct SbsParser {
    source: String,
    registry: Arc<AircraftRegistry>,
}

impl SbsParser {
    pub fn new(source: impl Into<String>, registry: Arc<AircraftRegistry>) -> Self {
        Self {
            source: source.into(),
            registry,
        }
    }

    /// `received_at` is the dispatcher-assigned receipt timestamp; the
    /// timestamps embedded in the feed line (fields 6-9) are ignored.
    pub fn parse(
        &self,
        line: &str,
        received_at: DateTime<Utc>,
    ) -> Result<PositionEvent, ParseFailure> {
        let raw_line = line.trim();
        if raw_line.is_empty() {
            return Err(ParseFailure::Malformed("empty line".to_string()));
        }

        let fields: Vec<&str> = raw_line.split(',').collect();

        let message_type = fields[IDX_MESSAGE_TYPE].trim();
        if message_type != "MSG" {
            return Err(ParseFailure::Unsupported(message_type.to_string()));
        }

        let icao_hex = field(&fields, IDX_ICAO)
            .map(str::to_uppercase)
            .ok_or(ParseFailure::MissingKey)?;

        let lat = field(&fields, IDX_LAT).and_then(parse_f64);
        let lon = field(&fields, IDX_LON).and_then(parse_f64);
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                (lat, lon)
            }
            _ => return Err(ParseFailure::NoPosition),
        };

        let mut aircraft = Aircraft {
            icao_hex,
            callsign: field(&fields, IDX_CALLSIGN).map(str::to_string),
            registration: None,
            icao_type: None,
            model: None,
            is_military: None,
            is_interesting: None,
            is_pia: None,
            is_ladd: None,
        };

        if let Some(info) = self.registry.lookup(&aircraft.icao_hex) {
            aircraft.registration = info.registration.clone();
            aircraft.icao_type = info.icao_type.clone();
            aircraft.model = info.model.clone();
            aircraft.is_military = Some(info.is_military);
            aircraft.is_interesting = Some(info.is_interesting);
            aircraft.is_pia = Some(info.is_pia);
            aircraft.is_ladd = Some(info.is_ladd);
        }

        Ok(PositionEvent {
            event_type: EVENT_TYPE.to_string(),
            source: self.source.clone(),
            received_at,
            aircraft,
            position: Position {
                lat,
                lon,
                altitude_ft: field(&fields, IDX_ALTITUDE).and_then(parse_i32),
                ground_speed_kts: field(&fields, IDX_GROUND_SPEED).and_then(parse_f64),
                track_deg: field(&fields, IDX_TRACK).and_then(parse_f64),
                vertical_rate_fpm: field(&fields, IDX_VERTICAL_RATE).and_then(parse_i32),
            },
            codes: Codes {
                squawk: field(&fields, IDX_SQUAWK).map(str::to_string),
                alert: field(&fields, IDX_ALERT).and_then(parse_flag),
                emergency: field(&fields, IDX_EMERGENCY).and_then(parse_flag),
                spi: field(&fields, IDX_SPI).and_then(parse_flag),
                on_ground: field(&fields, IDX_ON_GROUND).and_then(parse_flag),
            },
            raw: RawMessage {
                sbs: raw_line.to_string(),
                message_type: message_type.to_string(),
                transmission_type: field(&fields, IDX_TRANSMISSION_TYPE)
                    .and_then(|s| s.parse().ok()),
            },
        })
    }
}

/// Trimmed field at `idx`, or None when the line is too short or the field
/// is empty. Short lines are a missing-field condition, never an error.
fn field<'a>(fields: &[&'a str], idx: usize) -> Option<&'a str> {
    fields.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

// SBS carries integers like altitude as "38000" or occasionally "38000.0"
fn parse_i32(s: &str) -> Option<i32> {
    parse_f64(s).map(|v| v as i32)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITION_LINE: &str = "MSG,3,111,11111,3C5EF2,111111,2025/12/07,17:01:58.200,2025/12/07,17:01:58.400,EWG4TV,38000,376,158,45.630,8.936,,,0,0,0,0";

    fn parser() -> SbsParser {
        SbsParser::new("TEST_STATION", Arc::new(AircraftRegistry::empty()))
    }

    #[test]
    fn parses_position_line() {
        let event = parser().parse(POSITION_LINE, Utc::now()).unwrap();
        assert_eq!(event.event_type, EVENT_TYPE);
        assert_eq!(event.source, "TEST_STATION");
        assert_eq!(event.aircraft.icao_hex, "3C5EF2");
        assert_eq!(event.aircraft.callsign.as_deref(), Some("EWG4TV"));
        assert_eq!(event.position.lat, 45.630);
        assert_eq!(event.position.lon, 8.936);
        assert_eq!(event.position.altitude_ft, Some(38000));
        assert_eq!(event.position.ground_speed_kts, Some(376.0));
        assert_eq!(event.position.track_deg, Some(158.0));
        assert_eq!(event.position.vertical_rate_fpm, None);
        assert_eq!(event.codes.squawk, None);
        assert_eq!(event.codes.alert, Some(false));
        assert_eq!(event.codes.on_ground, Some(false));
        assert_eq!(event.raw.message_type, "MSG");
        assert_eq!(event.raw.transmission_type, Some(3));
        assert_eq!(event.raw.sbs, POSITION_LINE);
    }

    #[test]
    fn lowercase_icao_is_uppercased() {
        let line = POSITION_LINE.replace("3C5EF2", "3c5ef2");
        let event = parser().parse(&line, Utc::now()).unwrap();
        assert_eq!(event.aircraft.icao_hex, "3C5EF2");
    }

    #[test]
    fn non_msg_lines_are_unsupported() {
        assert_eq!(
            parser().parse("SEL,foo,bar", Utc::now()),
            Err(ParseFailure::Unsupported("SEL".to_string()))
        );
        assert_eq!(
            parser().parse("AIR,1,2,3,ABC123", Utc::now()),
            Err(ParseFailure::Unsupported("AIR".to_string()))
        );
    }

    #[test]
    fn blank_line_is_malformed() {
        assert!(matches!(
            parser().parse("   ", Utc::now()),
            Err(ParseFailure::Malformed(_))
        ));
    }

    #[test]
    fn missing_icao_is_missing_key() {
        assert_eq!(
            parser().parse("MSG,3,111,11111,,111111", Utc::now()),
            Err(ParseFailure::MissingKey)
        );
        // Truncated before the ICAO field
        assert_eq!(
            parser().parse("MSG,3,111", Utc::now()),
            Err(ParseFailure::MissingKey)
        );
    }

    #[test]
    fn missing_or_bad_position_is_no_position() {
        // Velocity-only message, no lat/lon
        let velocity = "MSG,4,111,11111,3C5EF2,111111,2025/12/07,17:01:58.200,2025/12/07,17:01:58.400,,,376,158,,,64,,,,,0";
        assert_eq!(
            parser().parse(velocity, Utc::now()),
            Err(ParseFailure::NoPosition)
        );

        let non_numeric = POSITION_LINE.replace("45.630", "north");
        assert_eq!(
            parser().parse(&non_numeric, Utc::now()),
            Err(ParseFailure::NoPosition)
        );

        let out_of_range = POSITION_LINE.replace("45.630", "91.2");
        assert_eq!(
            parser().parse(&out_of_range, Utc::now()),
            Err(ParseFailure::NoPosition)
        );

        // Line ends right before the lon field
        assert_eq!(
            parser().parse(
                "MSG,3,111,11111,3C5EF2,111111,2025/12/07,17:01:58.200,2025/12/07,17:01:58.400,EWG4TV,38000,376,158,45.630",
                Utc::now()
            ),
            Err(ParseFailure::NoPosition)
        );
    }

    #[test]
    fn malformed_optional_fields_become_absent() {
        let line = "MSG,3,111,11111,3C5EF2,111111,2025/12/07,17:01:58.200,2025/12/07,17:01:58.400,,garbage,,,45.630,8.936,up,7700,2,,x,";
        let event = parser().parse(line, Utc::now()).unwrap();
        assert_eq!(event.aircraft.callsign, None);
        assert_eq!(event.position.altitude_ft, None);
        assert_eq!(event.position.ground_speed_kts, None);
        assert_eq!(event.position.vertical_rate_fpm, None);
        assert_eq!(event.codes.squawk.as_deref(), Some("7700"));
        // "2" and "x" are neither "0" nor "1"
        assert_eq!(event.codes.alert, None);
        assert_eq!(event.codes.spi, None);
    }

    #[test]
    fn registry_hit_enriches_aircraft_block() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "3C5EF2;D-AEWT;A320;3;Airbus A320-214").unwrap();
        file.flush().unwrap();
        let registry = AircraftRegistry::load(file.path()).unwrap();

        let parser = SbsParser::new("TEST_STATION", Arc::new(registry));
        let event = parser.parse(POSITION_LINE, Utc::now()).unwrap();
        assert_eq!(event.aircraft.registration.as_deref(), Some("D-AEWT"));
        assert_eq!(event.aircraft.icao_type.as_deref(), Some("A320"));
        assert_eq!(event.aircraft.model.as_deref(), Some("Airbus A320-214"));
        assert_eq!(event.aircraft.is_military, Some(true));
        assert_eq!(event.aircraft.is_interesting, Some(true));
        assert_eq!(event.aircraft.is_pia, Some(false));
        assert_eq!(event.aircraft.is_ladd, Some(false));
    }

    #[test]
    fn registry_miss_leaves_enrichment_absent() {
        let event = parser().parse(POSITION_LINE, Utc::now()).unwrap();
        assert_eq!(event.aircraft.registration, None);
        assert_eq!(event.aircraft.is_military, None);
        assert_eq!(event.aircraft.is_pia, None);
    }
}
