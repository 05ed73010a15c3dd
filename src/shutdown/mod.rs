// Package shutdown provides graceful shutdown functionality.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::server::{Server, ServerError};

#[derive(Debug, thiserror::Error)]
#[error("graceful shutdown timeout exceeded")]
pub struct TimeoutError;

/// Graceful shutdown handler. Stops the server on an OS signal or on cancellation and
/// waits for the serving task within the configured timeout.
pub struct GracefulShutdown {
    shutdown_token: CancellationToken,
    timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(shutdown_token: CancellationToken, timeout: Duration) -> Self {
        Self {
            shutdown_token,
            timeout,
        }
    }

    /// Waits for a shutdown signal, or for the serving task to end on its own.
    pub async fn await_shutdown(
        &self,
        server: Arc<Server>,
        mut serving: JoinHandle<Vec<ServerError>>,
    ) -> Result<()> {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGINT",
                    "cancellation started"
                );
            }
            _ = self.shutdown_token.cancelled() => {
                info!(
                    component = "graceful-shutdown",
                    event = "ctx_done",
                    "cancellation started"
                );
            }
            joined = &mut serving => {
                self.shutdown_token.cancel();
                return match joined {
                    Ok(errs) if errs.is_empty() => Ok(()),
                    Ok(errs) => Err(anyhow::anyhow!("server stopped with {} error(s): {}", errs.len(), join_errors(&errs))),
                    Err(e) => Err(e.into()),
                };
            }
        }

        self.shutdown_token.cancel();
        if let Err(e) = server.stop() {
            warn!(component = "graceful-shutdown", event = "stop_failed", error = %e, "server was not running");
        }

        match timeout(self.timeout, serving).await {
            Ok(_) => {
                info!(
                    component = "graceful-shutdown",
                    event = "shutdown_success",
                    "service was gracefully shut down"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    component = "graceful-shutdown",
                    event = "shutdown_timeout",
                    timeout = %humantime::format_duration(self.timeout),
                    "not all endpoints were closed within timeout"
                );
                Err(TimeoutError.into())
            }
        }
    }
}

fn join_errors(errs: &[ServerError]) -> String {
    errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}
