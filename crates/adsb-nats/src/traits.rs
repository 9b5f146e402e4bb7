use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Publishing surface the bus sink depends on, kept narrow so tests can
/// substitute a mock for a live connection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, subject: String, payload: Bytes) -> Result<()>;

    async fn flush(&self) -> Result<()>;
}
