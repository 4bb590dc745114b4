//! Runs the long-lived processes of a service until shutdown.
//!
//! Each process is registered under a name and receives a shared
//! [`CancellationToken`]. The first process to fail, or SIGINT/SIGTERM,
//! cancels the token. Closers run afterwards within a timeout.
//!
//! # Example
//!
//! ```no_run
//! use edgehog_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_named_process("webhook", |ctx| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>
        + Send,
>;

pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every process returned or the token was cancelled
    Stopped,
    /// A process failed and brought the others down
    Failed { process: String, error: anyhow::Error },
}

pub struct Runner {
    processes: Vec<NamedProcess>,
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
    /// Closer timeout defaults to 10 seconds
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds a process; its name shows up in lifecycle logs
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.processes.push(NamedProcess {
            name: name.into(),
            process: Box::new(|token| Box::pin(process(token))),
        });
        self
    }

    /// Closers run after every process stopped, whatever the reason
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run until stopped, then exit the process with 0 or 1
    pub async fn run(self) {
        let token = self.cancellation_token.clone();
        spawn_signal_handlers(token);

        match self.run_until_stopped().await {
            RunOutcome::Stopped => {
                info!("application exiting normally");
                std::process::exit(0);
            }
            RunOutcome::Failed { process, error } => {
                error!(process = %process, "application exiting with error: {:#}", error);
                std::process::exit(1);
            }
        }
    }

    /// Run all processes and closers without installing signal handlers
    pub async fn run_until_stopped(self) -> RunOutcome {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for NamedProcess { name, process } in self.processes {
            let process_token = token.clone();
            debug!(process = %name, "starting process");
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        let mut outcome = RunOutcome::Stopped;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process stopped");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, "process failed: {:#}", err);
                        outcome = RunOutcome::Failed {
                            process: name,
                            error: err,
                        };
                        token.cancel();
                    } else {
                        debug!(process = %name, "process error after shutdown: {:#}", err);
                    }
                }
                Err(err) => {
                    error!("process panicked: {}", err);
                    if !token.is_cancelled() {
                        outcome = RunOutcome::Failed {
                            process: "unknown".to_string(),
                            error: anyhow::anyhow!("process panicked: {}", err),
                        };
                        token.cancel();
                    }
                }
            }
        }

        run_closers(self.closers, self.closer_timeout).await;

        outcome
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT");
                ctrl_c_token.cancel();
            }
            Err(err) => error!("failed to listen for SIGINT: {}", err),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
                token.cancel();
            }
            Err(err) => error!("failed to listen for SIGTERM: {}", err),
        }
    });
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    debug!("running {} closers with timeout of {:?}", closers.len(), timeout);

    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    let all_closed = async {
        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("closer completed"),
                Ok(Err(err)) => error!("closer error: {:#}", err),
                Err(err) => error!("closer panicked: {}", err),
            }
        }
    };

    if tokio::time::timeout(timeout, all_closed).await.is_err() {
        error!("closers timed out after {:?}", timeout);
    }
}
