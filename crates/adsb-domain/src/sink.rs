use crate::envelope::PositionEvent;
use crate::error::SinkResult;
use async_trait::async_trait;

/// Capability interface every storage/transport sink implements.
///
/// The dispatcher holds a list of `Arc<dyn EventSink>` and delivers each
/// envelope to all of them in arrival order. Implementations own their
/// durability policy:
/// - `accept` may buffer; it must not report success for data it could lose
///   past the next `flush` boundary.
/// - `flush` forces buffered work out (final batch commit, snapshot
///   materialization, file flush). Called periodically and once during drain.
/// - `close` releases resources after a final flush.
///
/// One sink's error must never block delivery to, or corrupt the state of,
/// another sink.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn accept(&self, event: &PositionEvent) -> SinkResult<()>;

    async fn flush(&self) -> SinkResult<()>;

    async fn close(&self) -> SinkResult<()>;
}
