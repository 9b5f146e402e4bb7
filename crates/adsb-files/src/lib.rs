//! File-backed sinks: the append-only history log and the
//! latest-position-per-aircraft snapshot.
//!
//! Both write the same CSV column set so the read path can treat them
//! uniformly: `timestamp_utc,icao,flight,lat,lon,altitude_ft,speed_kts,
//! heading_deg,squawk`.

mod history;
mod row;
mod snapshot;

#[cfg(test)]
pub(crate) mod test_support;

pub use history::HistorySink;
pub use row::PositionRow;
pub use snapshot::SnapshotSink;
