// Fake transport counting listens, closes and serve loops.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::server::{Listener, Transport};

#[derive(Default)]
struct Counters {
    listened: usize,
    closed: usize,
    serving: usize,
    served: usize,
}

/// FakeTransport fails to listen on addresses marked unbindable and fails to serve on
/// addresses marked broken. Other listeners serve until their shutdown token fires.
#[derive(Clone, Default)]
pub struct FakeTransport {
    unbindable: Arc<HashSet<String>>,
    broken: Arc<HashSet<String>>,
    counters: Arc<Mutex<Counters>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unbindable(mut self, address: &str) -> Self {
        Arc::make_mut(&mut self.unbindable).insert(address.to_string());
        self
    }

    pub fn broken(mut self, address: &str) -> Self {
        Arc::make_mut(&mut self.broken).insert(address.to_string());
        self
    }

    pub fn listened(&self) -> usize {
        self.counters.lock().listened
    }

    pub fn closed(&self) -> usize {
        self.counters.lock().closed
    }

    /// Serve loops currently running.
    pub fn serving(&self) -> usize {
        self.counters.lock().serving
    }

    /// Serve loops started so far.
    pub fn served(&self) -> usize {
        self.counters.lock().served
    }
}

impl Transport for FakeTransport {
    fn listen(&self, address: &str) -> Result<Box<dyn Listener>> {
        if self.unbindable.contains(address) {
            return Err(anyhow!("address {} already in use", address));
        }
        self.counters.lock().listened += 1;
        Ok(Box::new(FakeListener {
            broken: self.broken.contains(address),
            counters: self.counters.clone(),
        }))
    }
}

struct FakeListener {
    broken: bool,
    counters: Arc<Mutex<Counters>>,
}

#[async_trait]
impl Listener for FakeListener {
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn close(self: Box<Self>) {
        self.counters.lock().closed += 1;
    }

    async fn serve(self: Box<Self>, _router: Router, shutdown: CancellationToken) -> Result<()> {
        {
            let mut counters = self.counters.lock();
            counters.serving += 1;
            counters.served += 1;
        }

        let result = if self.broken {
            tokio::task::yield_now().await;
            Err(anyhow!("connection reset"))
        } else {
            shutdown.cancelled().await;
            Ok(())
        };

        self.counters.lock().serving -= 1;
        result
    }
}
