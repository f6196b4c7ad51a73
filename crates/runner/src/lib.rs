//! Concurrent process runner with graceful shutdown for the telemetry services.
//!
//! Every long-running piece of the platform (consumer loops, the gRPC server,
//! the HTTP ingress) is registered as an app process. The runner:
//! - runs all processes concurrently until one fails or a signal arrives
//! - cancels the shared token on SIGTERM/SIGINT
//! - drains in-flight work, then executes closers under a deadline
//! - exits non-zero on process error or when draining overruns the deadline

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// An app process takes the shutdown token and runs until cancelled or failed.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>
        + Send,
>;

/// A closer releases a resource after all app processes have stopped.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

pub struct Runner {
    app_processes: Vec<AppProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(30),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an app process. If any process returns an error, all processes are
    /// cancelled and closers run.
    pub fn with_app_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.app_processes.push(Box::new(|token| Box::pin(process(token))));
        self
    }

    /// Adds a closer. Closers run after all app processes have stopped,
    /// regardless of whether they stopped due to error or cancellation.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Deadline for the drain-and-close phase.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally-owned cancellation token.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs all app processes until completion, failure, or a shutdown signal,
    /// then executes closers and exits the process.
    pub async fn run(self) {
        let token = Arc::new(self.cancellation_token);
        let mut join_set = JoinSet::new();
        let closer_timeout = self.closer_timeout;
        let closers = self.closers;

        for process in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move { process((*process_token).clone()).await });
        }

        let signal_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received shutdown signal");
                    signal_token.cancel();
                }
                Err(err) => {
                    tracing::error!("Error setting up signal handler: {}", err);
                }
            }
        });

        #[cfg(unix)]
        {
            let sigterm_token = token.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm =
                    signal(SignalKind::terminate()).expect("Failed to set up SIGTERM handler");
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
                sigterm_token.cancel();
            });
        }

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    tracing::debug!("App process completed");
                }
                Ok(Err(err)) => {
                    if !token.is_cancelled() {
                        tracing::error!("App process error: {:#}", err);
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    tracing::error!("App process panicked: {}", err);
                    if !token.is_cancelled() {
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Drain remaining tasks under the shutdown deadline; a hung handler
        // must not keep the process alive forever.
        let drained = tokio::time::timeout(closer_timeout, join_set.shutdown()).await;
        let mut overran_deadline = drained.is_err();
        if overran_deadline {
            tracing::error!(deadline = ?closer_timeout, "In-flight handlers did not drain before deadline");
        }

        if !closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", closer_timeout);

            match tokio::time::timeout(closer_timeout, Self::run_closers(closers)).await {
                Ok(_) => {
                    tracing::info!("All closers completed");
                }
                Err(_) => {
                    tracing::error!("Closers timed out after {:?}", closer_timeout);
                    overran_deadline = true;
                }
            }
        }

        if let Some(err) = first_error {
            tracing::error!("Application exiting with error: {:#}", err);
            std::process::exit(1);
        } else if overran_deadline {
            std::process::exit(1);
        } else {
            tracing::info!("Application exiting normally");
            std::process::exit(0);
        }
    }

    async fn run_closers(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();

        for closer in closers {
            closer_set.spawn(async move { closer().await });
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    tracing::debug!("Closer completed");
                }
                Ok(Err(err)) => {
                    tracing::error!("Closer error: {:#}", err);
                }
                Err(err) => {
                    tracing::error!("Closer panicked: {}", err);
                }
            }
        }
    }
}
