use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version discriminator for the position event envelope.
///
/// The wire schema is additive-only; a new incompatible shape gets a new
/// version string and consumers must reject versions they do not know.
pub const EVENT_TYPE: &str = "adsb.position.v1";

/// The canonical parsed record produced from one SBS-1 feed line.
///
/// Immutable once constructed; every sink consumes the same value. Optional
/// fields mean "unknown", never zero and never false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub source: String,
    /// Receipt time assigned by the dispatcher, not extracted from the feed.
    /// Event time and arrival time are deliberately conflated; downstream
    /// consumers depend on receipt-time semantics.
    #[serde(rename = "receivedAtMs", with = "chrono::serde::ts_milliseconds")]
    pub received_at: DateTime<Utc>,
    pub aircraft: Aircraft,
    pub position: Position,
    pub codes: Codes,
    pub raw: RawMessage,
}

impl PositionEvent {
    pub fn is_current_version(&self) -> bool {
        self.event_type == EVENT_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Always present, non-empty, uppercase.
    #[serde(rename = "icaoHex")]
    pub icao_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    #[serde(rename = "icaoType", skip_serializing_if = "Option::is_none")]
    pub icao_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "isMilitary", skip_serializing_if = "Option::is_none")]
    pub is_military: Option<bool>,
    #[serde(rename = "isInteresting", skip_serializing_if = "Option::is_none")]
    pub is_interesting: Option<bool>,
    #[serde(rename = "isPIA", skip_serializing_if = "Option::is_none")]
    pub is_pia: Option<bool>,
    #[serde(rename = "isLADD", skip_serializing_if = "Option::is_none")]
    pub is_ladd: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "altitudeFt", skip_serializing_if = "Option::is_none")]
    pub altitude_ft: Option<i32>,
    #[serde(rename = "groundSpeedKts", skip_serializing_if = "Option::is_none")]
    pub ground_speed_kts: Option<f64>,
    #[serde(rename = "trackDeg", skip_serializing_if = "Option::is_none")]
    pub track_deg: Option<f64>,
    #[serde(rename = "verticalRateFpm", skip_serializing_if = "Option::is_none")]
    pub vertical_rate_fpm: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Codes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squawk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spi: Option<bool>,
    #[serde(rename = "onGround", skip_serializing_if = "Option::is_none")]
    pub on_ground: Option<bool>,
}

/// Original feed line, retained for auditability and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub sbs: String,
    #[serde(rename = "messageType")]
    pub message_type: String,
    #[serde(rename = "transmissionType", skip_serializing_if = "Option::is_none")]
    pub transmission_type: Option<i32>,
}
