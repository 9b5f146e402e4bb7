//! Process runner with graceful shutdown.
//!
//! Runs named long-lived processes concurrently until one of them fails or a
//! shutdown signal (SIGINT/SIGTERM) arrives, then cancels the rest and runs
//! the registered closers under a timeout. `run` returns the process exit
//! code so the binary stays in charge of actually exiting.
//!
//! # Example
//!
//! ```no_run
//! use runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let code = Runner::new()
//!         .with_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {}
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer("ticker", || async move { Ok(()) })
//!         .run()
//!         .await;
//!     std::process::exit(code);
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type BoxedFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

type Process = Box<dyn FnOnce(CancellationToken) -> BoxedFuture + Send>;

type Closer = Box<dyn FnOnce() -> BoxedFuture + Send>;

pub struct Runner {
    processes: Vec<(&'static str, Process)>,
    closers: Vec<(&'static str, Closer)>,
    closer_timeout: Duration,
    token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            token: CancellationToken::new(),
        }
    }

    /// Registers a named process. Processes run concurrently; the first one
    /// to return an error cancels all the others.
    pub fn with_process<F, Fut>(mut self, name: &'static str, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.processes
            .push((name, Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Registers a named cleanup step, executed after every process has
    /// stopped regardless of how they stopped.
    pub fn with_closer<F, Fut>(mut self, name: &'static str, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push((name, Box::new(|| Box::pin(closer()))));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Supplies an external token, letting callers trigger shutdown
    /// programmatically (used by tests).
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Runs everything to completion and returns the exit code: 0 for a
    /// clean shutdown, 1 if any process or closer failed.
    pub async fn run(self) -> i32 {
        let token = self.token;
        let closers = self.closers;
        let closer_timeout = self.closer_timeout;

        let mut join_set = JoinSet::new();
        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        spawn_signal_handlers(&token);

        let mut failed = false;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = name, "process finished");
                }
                Ok((name, Err(err))) => {
                    error!(process = name, "process failed: {err:#}");
                    failed = true;
                    token.cancel();
                }
                Err(err) => {
                    error!("process panicked: {err}");
                    failed = true;
                    token.cancel();
                }
            }
        }

        if !closers.is_empty() {
            info!(timeout = ?closer_timeout, "running closers");
            if tokio::time::timeout(closer_timeout, run_closers(closers, &mut failed))
                .await
                .is_err()
            {
                error!("closers timed out after {:?}", closer_timeout);
                failed = true;
            }
        }

        if failed {
            error!("shutting down with failures");
            1
        } else {
            info!("shut down cleanly");
            0
        }
    }
}

fn spawn_signal_handlers(token: &CancellationToken) {
    let interrupt_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received interrupt, shutting down");
                interrupt_token.cancel();
            }
            Err(err) => error!("failed to install interrupt handler: {err}"),
        }
    });

    #[cfg(unix)]
    {
        let terminate_token = token.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("received SIGTERM, shutting down");
                    terminate_token.cancel();
                }
                Err(err) => error!("failed to install SIGTERM handler: {err}"),
            }
        });
    }
}

async fn run_closers(closers: Vec<(&'static str, Closer)>, failed: &mut bool) {
    let mut closer_set = JoinSet::new();
    for (name, closer) in closers {
        closer_set.spawn(async move { (name, closer().await) });
    }

    while let Some(joined) = closer_set.join_next().await {
        match joined {
            Ok((name, Ok(()))) => debug!(closer = name, "closer finished"),
            Ok((name, Err(err))) => {
                error!(closer = name, "closer failed: {err:#}");
                *failed = true;
            }
            Err(err) => {
                error!("closer panicked: {err}");
                *failed = true;
            }
        }
    }
}
