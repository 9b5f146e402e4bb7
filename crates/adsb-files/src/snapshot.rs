use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use adsb_domain::{EventSink, PositionEvent, SinkError, SinkResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::history::CSV_HEADER;
use crate::row::PositionRow;

struct SnapshotState {
    // Keyed by ICAO hex; BTreeMap keeps materialized output sorted
    latest: BTreeMap<String, PositionRow>,
    since_write: usize,
}

/// Latest-position-per-aircraft snapshot with atomic whole-file replace.
///
/// The mapping is owned solely by this sink and mutated only under its lock
/// (single writer, whole map). Materialization writes every entry to a
/// temporary file in the target directory and renames it over the snapshot
/// path, so readers always see a self-consistent whole snapshot and never a
/// partial write. Entries are never expired here; staleness filtering is a
/// read-time concern.
pub struct SnapshotSink {
    path: PathBuf,
    state: Mutex<SnapshotState>,
    write_every: usize,
}

impl SnapshotSink {
    /// Creates the snapshot file (header only) if absent and prepares the
    /// in-memory mapping.
    pub fn open(path: &Path, write_every: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output directory {}", parent.display()))?;
        }

        let sink = Self {
            path: path.to_path_buf(),
            state: Mutex::new(SnapshotState {
                latest: BTreeMap::new(),
                since_write: 0,
            }),
            write_every: write_every.max(1),
        };

        if !path.exists() {
            sink.materialize(&BTreeMap::new())
                .with_context(|| format!("failed to create snapshot file {}", path.display()))?;
        }
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full replace: temp file in the same directory, then atomic rename.
    fn materialize(&self, latest: &BTreeMap<String, PositionRow>) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir)
            .context("failed to create snapshot temp file")?;

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file());
            writer
                .write_record(CSV_HEADER)
                .context("failed to write snapshot header")?;
            for row in latest.values() {
                writer.serialize(row).context("failed to write snapshot row")?;
            }
            writer.flush().context("failed to flush snapshot")?;
        }

        tmp.persist(&self.path)
            .context("failed to replace snapshot file")?;
        debug!(path = %self.path.display(), entries = latest.len(), "materialized snapshot");
        Ok(())
    }
}

#[async_trait]
impl EventSink for SnapshotSink {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn accept(&self, event: &PositionEvent) -> SinkResult<()> {
        let mut state = self.state.lock().await;
        state
            .latest
            .insert(event.aircraft.icao_hex.clone(), PositionRow::from(event));
        state.since_write += 1;
        if state.since_write >= self.write_every {
            self.materialize(&state.latest).map_err(classify)?;
            state.since_write = 0;
        }
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        let mut state = self.state.lock().await;
        self.materialize(&state.latest).map_err(classify)?;
        state.since_write = 0;
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        self.flush().await
    }
}

fn classify(err: anyhow::Error) -> SinkError {
    match err.root_cause().downcast_ref::<std::io::Error>() {
        Some(io) if io.raw_os_error() == Some(28) => SinkError::persistent(err),
        _ => SinkError::transient(err),
    }
}
