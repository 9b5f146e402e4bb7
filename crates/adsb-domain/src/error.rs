use thiserror::Error;

/// Why a raw feed line did not become a [`PositionEvent`](crate::PositionEvent).
///
/// All variants are non-fatal: the dispatcher counts them and moves on.
/// `NoPosition` is the expected common case (most SBS messages carry no
/// lat/lon) and must never be logged as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("unsupported message type: {0:?}")]
    Unsupported(String),
    #[error("missing ICAO hex field")]
    MissingKey,
    #[error("no usable position")]
    NoPosition,
    #[error("malformed line: {0}")]
    Malformed(String),
}

/// Sink-level failure, split by whether retrying can help.
///
/// Transient failures (connection drops, timeouts) are retried with backoff
/// without dropping data the sink already buffered. Persistent failures
/// (disk full, schema mismatch) disable the sink; other sinks continue.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transient sink failure: {0}")]
    Transient(#[source] anyhow::Error),
    #[error("persistent sink failure: {0}")]
    Persistent(#[source] anyhow::Error),
}

impl SinkError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        SinkError::Transient(err.into())
    }

    pub fn persistent(err: impl Into<anyhow::Error>) -> Self {
        SinkError::Persistent(err.into())
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, SinkError::Persistent(_))
    }
}

pub type SinkResult<T> = Result<T, SinkError>;
