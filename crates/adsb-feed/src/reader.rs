use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 30003,
            reconnect_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Owns the TCP connection to the upstream receiver and yields raw lines.
///
/// `next_line` returns `None` only when the shutdown token fires; every
/// other condition (unreachable host, read error, EOF) drops the socket,
/// waits `reconnect_delay` and retries indefinitely.
pub struct FeedReader {
    config: FeedConfig,
    shutdown: CancellationToken,
    conn: Option<BufReader<TcpStream>>,
    buf: Vec<u8>,
}

impl FeedReader {
    pub fn new(config: FeedConfig, shutdown: CancellationToken) -> Self {
        Self {
            config,
            shutdown,
            conn: None,
            buf: Vec::with_capacity(256),
        }
    }

    /// Next newline-terminated line from the feed, trimmed and non-empty.
    ///
    /// An unterminated fragment at stream end is discarded rather than
    /// emitted, so a consumer never processes partial data as complete.
    ///
    /// Safe to race in a `tokio::select!`: bytes already read stay in
    /// `self.buf` when the returned future is dropped mid-line, and the next
    /// call resumes reading the same line. The buffer is only cleared once a
    /// full line has been extracted or the connection is dropped.
    pub async fn next_line(&mut self) -> Option<String> {
        let shutdown = self.shutdown.clone();
        loop {
            if shutdown.is_cancelled() {
                return None;
            }

            if self.conn.is_none() {
                self.conn = Some(self.connect().await?);
                self.buf.clear();
            }
            let Some(reader) = self.conn.as_mut() else {
                continue;
            };

            let read = tokio::select! {
                _ = shutdown.cancelled() => return None,
                read = reader.read_until(b'\n', &mut self.buf) => read,
            };

            match read {
                Ok(0) => {
                    info!("feed closed by receiver");
                    self.drop_connection();
                    self.wait_for_retry().await?;
                }
                Ok(_) if !self.buf.ends_with(b"\n") => {
                    debug!(
                        bytes = self.buf.len(),
                        "discarding unterminated fragment at stream end"
                    );
                    self.drop_connection();
                    self.wait_for_retry().await?;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf).trim().to_string();
                    self.buf.clear();
                    if !line.is_empty() {
                        return Some(line);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "feed read error");
                    self.drop_connection();
                    self.wait_for_retry().await?;
                }
            }
        }
    }

    /// Any partially accumulated line dies with the connection.
    fn drop_connection(&mut self) {
        self.conn = None;
        self.buf.clear();
    }

    async fn connect(&self) -> Option<BufReader<TcpStream>> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }
            debug!(addr = %addr, "connecting to receiver");

            let attempt = tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                attempt = tokio::time::timeout(
                    self.config.connect_timeout,
                    TcpStream::connect(&addr),
                ) => attempt,
            };

            match attempt {
                Ok(Ok(stream)) => {
                    info!(addr = %addr, "connected to receiver");
                    return Some(BufReader::new(stream));
                }
                Ok(Err(err)) => {
                    warn!(addr = %addr, error = %err, "connect failed");
                }
                Err(_) => {
                    warn!(addr = %addr, timeout_secs = self.config.connect_timeout.as_secs(), "connect timed out");
                }
            }

            self.wait_for_retry().await?;
        }
    }

    async fn wait_for_retry(&self) -> Option<()> {
        debug!(
            delay_secs = self.config.reconnect_delay.as_secs(),
            "waiting before reconnect"
        );
        tokio::select! {
            _ = self.shutdown.cancelled() => None,
            _ = tokio::time::sleep(self.config.reconnect_delay) => Some(()),
        }
    }
}
