use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use adsb_domain::{EventSink, PositionEvent, SinkError, SinkResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::row::PositionRow;

pub(crate) const CSV_HEADER: [&str; 9] = [
    "timestamp_utc",
    "icao",
    "flight",
    "lat",
    "lon",
    "altitude_ft",
    "speed_kts",
    "heading_deg",
    "squawk",
];

struct HistoryState {
    writer: csv::Writer<std::fs::File>,
    since_flush: usize,
}

/// Append-only log of every accepted envelope, one CSV row per event in
/// arrival order. Rows are never updated, deleted or deduplicated.
///
/// The writer is flushed every `flush_every` rows and on every `flush()`
/// call; the dispatcher's drain issues the mandatory final flush.
pub struct HistorySink {
    path: PathBuf,
    state: Mutex<HistoryState>,
    flush_every: usize,
}

impl HistorySink {
    /// Opens (or creates, with header) the history file for appending.
    pub fn open(path: &Path, flush_every: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output directory {}", parent.display()))?;
        }

        let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open history file {}", path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer
                .write_record(CSV_HEADER)
                .context("failed to write history header")?;
            writer.flush().context("failed to flush history header")?;
            info!(path = %path.display(), "created history file");
        }

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(HistoryState {
                writer,
                since_flush: 0,
            }),
            flush_every: flush_every.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventSink for HistorySink {
    fn name(&self) -> &'static str {
        "history"
    }

    async fn accept(&self, event: &PositionEvent) -> SinkResult<()> {
        let row = PositionRow::from(event);
        let mut state = self.state.lock().await;
        state.writer.serialize(&row).map_err(classify)?;
        state.since_flush += 1;
        if state.since_flush >= self.flush_every {
            state.writer.flush().map_err(io_classify)?;
            state.since_flush = 0;
        }
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        let mut state = self.state.lock().await;
        state.writer.flush().map_err(io_classify)?;
        state.since_flush = 0;
        debug!(path = %self.path.display(), "flushed history file");
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        self.flush().await
    }
}

fn classify(err: csv::Error) -> SinkError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => io_classify(io),
        other => SinkError::persistent(anyhow::anyhow!("csv write failed: {other:?}")),
    }
}

pub(crate) fn io_classify(err: std::io::Error) -> SinkError {
    // ENOSPC: the disk is full, retrying will not help
    if err.raw_os_error() == Some(28) {
        SinkError::persistent(err)
    } else {
        SinkError::transient(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::event;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn creates_file_with_header_and_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        let sink = HistorySink::open(&path, 1).unwrap();
        sink.accept(&event("AAA111", 45.0, 8.0, 1_000)).await.unwrap();
        sink.accept(&event("BBB222", 46.0, 9.0, 2_000)).await.unwrap();
        sink.close().await.unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert!(lines[1].contains("AAA111"));
        assert!(lines[2].contains("BBB222"));
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_events_are_appended_not_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        let sink = HistorySink::open(&path, 1).unwrap();
        let ev = event("AAA111", 45.0, 8.0, 1_000);
        sink.accept(&ev).await.unwrap();
        sink.accept(&ev).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(read_lines(&path).len(), 3);
    }

    #[tokio::test]
    async fn reopening_does_not_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        {
            let sink = HistorySink::open(&path, 1).unwrap();
            sink.accept(&event("AAA111", 45.0, 8.0, 1_000)).await.unwrap();
            sink.close().await.unwrap();
        }
        {
            let sink = HistorySink::open(&path, 1).unwrap();
            sink.accept(&event("BBB222", 46.0, 9.0, 2_000)).await.unwrap();
            sink.close().await.unwrap();
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.join(","));
    }

    #[tokio::test]
    async fn buffered_rows_survive_via_final_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        // Large flush interval: rows stay in the writer buffer
        let sink = HistorySink::open(&path, 1_000).unwrap();
        sink.accept(&event("AAA111", 45.0, 8.0, 1_000)).await.unwrap();
        sink.flush().await.unwrap();

        assert_eq!(read_lines(&path).len(), 2);
    }
}
