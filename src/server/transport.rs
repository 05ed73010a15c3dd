// Transport listeners the orchestrator serves on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Router;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Transport creates listeners. Listening is synchronous so that a set of endpoints can be
/// bound, or rolled back, in a single pass.
pub trait Transport: Send + Sync {
    fn listen(&self, address: &str) -> Result<Box<dyn Listener>>;
}

/// Listener is one bound endpoint.
#[async_trait]
pub trait Listener: Send {
    /// Address actually bound, when the transport knows it.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Releases the listener without serving.
    fn close(self: Box<Self>);

    /// Serves `router` until `shutdown` is cancelled or the listener fails.
    async fn serve(self: Box<Self>, router: Router, shutdown: CancellationToken) -> Result<()>;
}

pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// TcpTransport listens on TCP sockets and serves HTTP through axum. Once shutdown is
/// requested, in-flight requests get at most `drain_timeout` to finish.
#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    drain_timeout: Duration,
}

impl TcpTransport {
    pub fn new(drain_timeout: Duration) -> Self {
        Self { drain_timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_DRAIN_TIMEOUT)
    }
}

impl Transport for TcpTransport {
    fn listen(&self, address: &str) -> Result<Box<dyn Listener>> {
        let listener =
            std::net::TcpListener::bind(address).with_context(|| format!("failed to bind TCP listener on {}", address))?;
        listener
            .set_nonblocking(true)
            .context("failed to switch listener to non-blocking mode")?;
        Ok(Box::new(TcpEndpoint {
            listener,
            drain_timeout: self.drain_timeout,
        }))
    }
}

struct TcpEndpoint {
    listener: std::net::TcpListener,
    drain_timeout: Duration,
}

#[async_trait]
impl Listener for TcpEndpoint {
    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    fn close(self: Box<Self>) {
        drop(self.listener);
    }

    async fn serve(self: Box<Self>, router: Router, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::from_std(self.listener).context("failed to register TCP listener")?;
        let graceful = shutdown.clone();
        let serving = axum::serve(listener, router)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .into_future();
        tokio::pin!(serving);

        let drain_timeout = self.drain_timeout;
        let drain_expired = async move {
            shutdown.cancelled().await;
            tokio::time::sleep(drain_timeout).await;
        };

        tokio::select! {
            result = &mut serving => result.context("serve failed"),
            _ = drain_expired => {
                warn!(
                    component = "server",
                    event = "drain_timeout",
                    timeout = %humantime::format_duration(drain_timeout),
                    "in-flight requests abandoned after shutdown"
                );
                Ok(())
            }
        }
    }
}
