use std::sync::Arc;
use std::time::Duration;

use adsb_domain::{EventSink, ParseFailure, PositionEvent, SbsParser, SinkError};
use anyhow::{bail, Result};
use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::source::LineSource;
use crate::stats::ParseStats;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub flush_interval: Duration,
    pub sink_retry_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            sink_retry_delay: Duration::from_secs(5),
        }
    }
}

enum SinkHealth {
    Active,
    Backoff { until: Instant },
    Disabled,
}

struct SinkSlot {
    sink: Arc<dyn EventSink>,
    health: SinkHealth,
}

impl SinkSlot {
    /// Clears an expired backoff. Returns whether the sink may be called.
    fn ready(&mut self, now: Instant) -> bool {
        match self.health {
            SinkHealth::Active => true,
            SinkHealth::Backoff { until } if now >= until => {
                self.health = SinkHealth::Active;
                true
            }
            _ => false,
        }
    }

    fn disabled(&self) -> bool {
        matches!(self.health, SinkHealth::Disabled)
    }
}

/// Single-task pipeline: each feed line is parsed once and the resulting
/// event is offered to every sink in turn, so per-sink arrival order matches
/// feed order. One sink's failure never blocks another: a Transient error
/// puts that sink into a timed backoff, a Persistent error disables it for
/// the rest of the process lifetime.
pub struct Dispatcher {
    parser: SbsParser,
    slots: Vec<SinkSlot>,
    config: DispatcherConfig,
    stats: ParseStats,
}

impl Dispatcher {
    pub fn new(parser: SbsParser, sinks: Vec<Arc<dyn EventSink>>, config: DispatcherConfig) -> Self {
        Self {
            parser,
            slots: sinks
                .into_iter()
                .map(|sink| SinkSlot {
                    sink,
                    health: SinkHealth::Active,
                })
                .collect(),
            config,
            stats: ParseStats::default(),
        }
    }

    /// Pulls lines until the token fires or the source ends, then drains.
    pub async fn run<S: LineSource>(
        mut self,
        mut source: S,
        token: CancellationToken,
    ) -> Result<()> {
        info!(state = "Running", sinks = self.slots.len(), "dispatcher started");

        let mut flush_tick = tokio::time::interval_at(
            Instant::now() + self.config.flush_interval,
            self.config.flush_interval,
        );
        flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = flush_tick.tick() => {
                    self.flush_sinks().await;
                    self.stats.log();
                }
                line = source.next_line() => {
                    match line {
                        Some(line) => self.handle_line(&line).await,
                        None => break,
                    }
                }
            }
        }

        info!(state = "Draining", "dispatcher draining");
        let result = self.drain().await;
        self.stats.log();
        info!(state = "Stopped", "dispatcher stopped");
        result
    }

    async fn handle_line(&mut self, line: &str) {
        match self.parser.parse(line, Utc::now()) {
            Ok(event) => {
                self.stats.accepted += 1;
                self.dispatch(&event).await;
            }
            Err(ParseFailure::Unsupported(kind)) => {
                self.stats.unsupported += 1;
                trace!(kind = %kind, "skipped non-transponder line");
            }
            Err(ParseFailure::MissingKey) => {
                self.stats.missing_key += 1;
                debug!("skipped line without aircraft identifier");
            }
            Err(ParseFailure::NoPosition) => {
                self.stats.no_position += 1;
                trace!("skipped line without usable coordinates");
            }
            Err(ParseFailure::Malformed(reason)) => {
                self.stats.malformed += 1;
                warn!(reason = %reason, "skipped malformed feed line");
            }
        }
    }

    async fn dispatch(&mut self, event: &PositionEvent) {
        let now = Instant::now();
        for slot in &mut self.slots {
            if !slot.ready(now) {
                if !slot.disabled() {
                    self.stats.sink_skipped += 1;
                }
                continue;
            }
            if let Err(err) = slot.sink.accept(event).await {
                self.stats.sink_skipped += 1;
                Self::degrade(slot, err, self.config.sink_retry_delay, "accept");
            }
        }
    }

    async fn flush_sinks(&mut self) {
        let now = Instant::now();
        for slot in &mut self.slots {
            if !slot.ready(now) {
                continue;
            }
            if let Err(err) = slot.sink.flush().await {
                Self::degrade(slot, err, self.config.sink_retry_delay, "flush");
            }
        }
    }

    /// Flushes and closes every sink that is still enabled. Backoff does not
    /// excuse a sink from the final drain; only disabled sinks are skipped.
    async fn drain(&mut self) -> Result<()> {
        let mut failed: Vec<&'static str> = Vec::new();
        for slot in &mut self.slots {
            if slot.disabled() {
                continue;
            }
            if let Err(err) = slot.sink.flush().await {
                error!(sink = slot.sink.name(), "final flush failed: {err}");
                failed.push(slot.sink.name());
                continue;
            }
            if let Err(err) = slot.sink.close().await {
                error!(sink = slot.sink.name(), "close failed: {err}");
                failed.push(slot.sink.name());
            }
        }
        if !failed.is_empty() {
            bail!("sinks refused to drain cleanly: {}", failed.join(", "));
        }
        Ok(())
    }

    fn degrade(slot: &mut SinkSlot, err: SinkError, retry_delay: Duration, op: &str) {
        if err.is_persistent() {
            error!(sink = slot.sink.name(), "disabling sink after {op} failure: {err}");
            slot.health = SinkHealth::Disabled;
        } else {
            warn!(
                sink = slot.sink.name(),
                retry_in = ?retry_delay,
                "sink {op} failed, backing off: {err}"
            );
            slot.health = SinkHealth::Backoff {
                until: Instant::now() + retry_delay,
            };
        }
    }
}
