//! Server orchestrator.
//!
//! A [`Server`] owns a fixed set of endpoints, one per versioned API. `start` binds every
//! endpoint or none, serves each one on its own task and returns once all of them have
//! stopped. The first endpoint to finish, cleanly or not, stops all the others.

use anyhow::anyhow;
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::error::ServerError;
use super::transport::{Listener, Transport};
use super::types::{ApiGroup, VersionedApi};

struct Endpoint {
    api: VersionedApi,
    address: Option<String>,
}

#[derive(Default)]
struct State {
    started: bool,
    tokens: Vec<CancellationToken>,
    bound: HashMap<String, SocketAddr>,
}

struct Done {
    index: usize,
    result: anyhow::Result<()>,
}

/// Server aggregates API groups and serves all of their versions.
pub struct Server {
    transport: Arc<dyn Transport>,
    endpoints: Vec<Endpoint>,
    state: Mutex<State>,
}

impl Server {
    /// Creates a server for `groups`. Each versioned API is served on the address
    /// configured under its `<group>/<version>` key.
    pub fn new(
        transport: Arc<dyn Transport>,
        addresses: &HashMap<String, String>,
        groups: &[Arc<dyn ApiGroup>],
    ) -> Self {
        let endpoints = groups
            .iter()
            .flat_map(|group| group.versioned_apis())
            .map(|api| Endpoint {
                address: addresses.get(&api.key()).cloned(),
                api,
            })
            .collect();

        Self {
            transport,
            endpoints,
            state: Mutex::new(State::default()),
        }
    }

    /// Serves every endpoint until one of them stops, then stops the rest.
    ///
    /// `listening` fires once every listener exists. The returned list holds the listen
    /// errors when binding failed, otherwise the serve errors of the endpoints.
    pub async fn start(&self, listening: Option<oneshot::Sender<()>>) -> Vec<ServerError> {
        let mut done = match self.start_listening() {
            Ok(done) => done,
            Err(errs) => return errs,
        };

        if let Some(tx) = listening {
            let _ = tx.send(());
        }

        self.wait_for_endpoints_to_stop(&mut done).await
    }

    /// Stops every endpoint. Calling it again is a no-op.
    pub fn stop(&self) -> Result<(), ServerError> {
        let state = self.state.lock();
        if !state.started {
            return Err(ServerError::NotStarted);
        }

        for token in &state.tokens {
            token.cancel();
        }

        Ok(())
    }

    /// Address bound for `<group>/<version>` once the server is listening.
    pub fn local_addr(&self, group: &str, version: &str) -> Option<SocketAddr> {
        self.state.lock().bound.get(&format!("{}/{}", group, version)).copied()
    }

    fn start_listening(&self) -> Result<mpsc::Receiver<Done>, Vec<ServerError>> {
        let mut state = self.state.lock();
        if state.started {
            return Err(vec![ServerError::AlreadyStarted]);
        }
        state.started = true;

        let listeners = self.create_listeners()?;
        Ok(self.start_endpoints(&mut state, listeners))
    }

    fn create_listeners(&self) -> Result<Vec<Box<dyn Listener>>, Vec<ServerError>> {
        let mut listeners = Vec::with_capacity(self.endpoints.len());
        let mut errs = Vec::new();

        for endpoint in &self.endpoints {
            let result = match &endpoint.address {
                Some(address) => self.transport.listen(address),
                None => Err(anyhow!("no address configured for {}", endpoint.api.key())),
            };
            match result {
                Ok(listener) => listeners.push(listener),
                Err(source) => errs.push(ServerError::Listen {
                    group: endpoint.api.group.clone(),
                    version: endpoint.api.version.clone(),
                    address: endpoint.address.clone().unwrap_or_default(),
                    source,
                }),
            }
        }

        if !errs.is_empty() {
            for listener in listeners {
                listener.close();
            }
            return Err(errs);
        }

        Ok(listeners)
    }

    fn start_endpoints(&self, state: &mut State, listeners: Vec<Box<dyn Listener>>) -> mpsc::Receiver<Done> {
        let (tx, rx) = mpsc::channel(self.endpoints.len().max(1));

        for (index, (endpoint, listener)) in self.endpoints.iter().zip(listeners).enumerate() {
            let token = CancellationToken::new();
            state.tokens.push(token.clone());

            let local_addr = listener.local_addr();
            if let Some(addr) = local_addr {
                state.bound.insert(endpoint.api.key(), addr);
            }

            info!(
                component = "server",
                event = "endpoint_listening",
                group = %endpoint.api.group,
                version = %endpoint.api.version,
                address = ?local_addr,
                "endpoint listening"
            );

            let router = (endpoint.api.registrant)(Router::new());
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = listener.serve(router, token).await;
                let _ = tx.send(Done { index, result }).await;
            });
        }

        rx
    }

    async fn wait_for_endpoints_to_stop(&self, done: &mut mpsc::Receiver<Done>) -> Vec<ServerError> {
        let mut errs = Vec::new();

        if let Some(first) = done.recv().await {
            self.process_done(first, &mut errs);
        }

        if let Err(e) = self.stop() {
            error!(component = "server", event = "stop_failed", error = %e, "failed to stop endpoints");
        }

        // Every serve task holds a sender, so the channel closes once all have reported.
        while let Some(event) = done.recv().await {
            self.process_done(event, &mut errs);
        }

        info!(component = "server", event = "stopped", errors = errs.len(), "all endpoints stopped");
        errs
    }

    fn process_done(&self, event: Done, errs: &mut Vec<ServerError>) {
        let api = &self.endpoints[event.index].api;
        match event.result {
            Ok(()) => info!(
                component = "server",
                event = "endpoint_stopped",
                group = %api.group,
                version = %api.version,
                "endpoint stopped"
            ),
            Err(source) => {
                error!(
                    component = "server",
                    event = "endpoint_failed",
                    group = %api.group,
                    version = %api.version,
                    error = %source,
                    "endpoint failed"
                );
                errs.push(ServerError::Serve {
                    group: api.group.clone(),
                    version: api.version.clone(),
                    source,
                });
            }
        }
    }
}
