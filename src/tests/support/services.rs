// In-memory service graph.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cim::CimError;
use crate::system::{Service, ServiceFactory};

const RUNNING: &str = "Running";
const STOPPED: &str = "Stopped";

#[derive(Debug, Clone)]
struct Entry {
    state: String,
    dependents: Vec<String>,
    start_code: Option<u32>,
    stop_code: Option<u32>,
    stuck: bool,
}

#[derive(Default)]
struct Graph {
    services: HashMap<String, Entry>,
    started: Vec<String>,
    stopped: Vec<String>,
    lookups: usize,
}

/// FakeServiceGraph behaves like the host service manager: starting succeeds unless the
/// service is already running (code 10) and stopping is refused with code 3 while a
/// running dependent exists. Stuck services accept transitions without changing state.
#[derive(Clone, Default)]
pub struct FakeServiceGraph {
    graph: Arc<Mutex<Graph>>,
}

impl FakeServiceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, name: &str, state: &str, dependents: &[&str]) -> Self {
        self.graph.lock().services.insert(
            name.to_string(),
            Entry {
                state: state.to_string(),
                dependents: dependents.iter().map(|d| d.to_string()).collect(),
                start_code: None,
                stop_code: None,
                stuck: false,
            },
        );
        self
    }

    /// Forces the code returned by the next start requests.
    pub fn with_start_code(self, name: &str, code: u32) -> Self {
        if let Some(entry) = self.graph.lock().services.get_mut(name) {
            entry.start_code = Some(code);
        }
        self
    }

    pub fn with_stop_code(self, name: &str, code: u32) -> Self {
        if let Some(entry) = self.graph.lock().services.get_mut(name) {
            entry.stop_code = Some(code);
        }
        self
    }

    pub fn stuck(self, name: &str) -> Self {
        if let Some(entry) = self.graph.lock().services.get_mut(name) {
            entry.stuck = true;
        }
        self
    }

    pub fn state_of(&self, name: &str) -> Option<String> {
        self.graph.lock().services.get(name).map(|e| e.state.clone())
    }

    /// Services stopped so far, in order.
    pub fn stopped(&self) -> Vec<String> {
        self.graph.lock().stopped.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.graph.lock().started.clone()
    }

    pub fn lookups(&self) -> usize {
        self.graph.lock().lookups
    }

    fn handle(&self, name: &str) -> Arc<dyn Service> {
        Arc::new(FakeService {
            name: name.to_string(),
            graph: self.graph.clone(),
        })
    }
}

#[async_trait]
impl ServiceFactory for FakeServiceGraph {
    async fn get_service(&self, name: &str) -> Result<Arc<dyn Service>, CimError> {
        let mut graph = self.graph.lock();
        graph.lookups += 1;
        if !graph.services.contains_key(name) {
            return Err(CimError::NotFound {
                namespace: "fake".to_string(),
                query: format!("service {}", name),
            });
        }
        drop(graph);
        Ok(self.handle(name))
    }
}

struct FakeService {
    name: String,
    graph: Arc<Mutex<Graph>>,
}

impl FakeService {
    fn entry(&self) -> Result<Entry, CimError> {
        self.graph
            .lock()
            .services
            .get(&self.name)
            .cloned()
            .ok_or_else(|| CimError::NotFound {
                namespace: "fake".to_string(),
                query: format!("service {}", self.name),
            })
    }
}

#[async_trait]
impl Service for FakeService {
    async fn name(&self) -> Result<String, CimError> {
        Ok(self.name.clone())
    }

    async fn display_name(&self) -> Result<String, CimError> {
        Ok(format!("{} service", self.name))
    }

    async fn state(&self) -> Result<String, CimError> {
        Ok(self.entry()?.state)
    }

    async fn start_mode(&self) -> Result<String, CimError> {
        Ok("Manual".to_string())
    }

    async fn dependents(&self) -> Result<Vec<Arc<dyn Service>>, CimError> {
        Ok(self
            .entry()?
            .dependents
            .into_iter()
            .map(|name| {
                Arc::new(FakeService {
                    name,
                    graph: self.graph.clone(),
                }) as Arc<dyn Service>
            })
            .collect())
    }

    async fn start_service(&self) -> Result<u32, CimError> {
        let mut graph = self.graph.lock();
        let entry = graph.services.get_mut(&self.name).ok_or_else(|| CimError::NotFound {
            namespace: "fake".to_string(),
            query: format!("service {}", self.name),
        })?;
        if let Some(code) = entry.start_code {
            return Ok(code);
        }
        if entry.state == RUNNING {
            return Ok(10);
        }
        if !entry.stuck {
            entry.state = RUNNING.to_string();
        }
        graph.started.push(self.name.clone());
        Ok(0)
    }

    async fn stop_service(&self) -> Result<u32, CimError> {
        let mut graph = self.graph.lock();
        let entry = graph.services.get(&self.name).cloned().ok_or_else(|| CimError::NotFound {
            namespace: "fake".to_string(),
            query: format!("service {}", self.name),
        })?;
        if let Some(code) = entry.stop_code {
            return Ok(code);
        }
        let blocked = entry
            .dependents
            .iter()
            .any(|d| graph.services.get(d).map(|e| e.state == RUNNING).unwrap_or(false));
        if blocked {
            return Ok(3);
        }
        if !entry.stuck {
            if let Some(e) = graph.services.get_mut(&self.name) {
                e.state = STOPPED.to_string();
            }
        }
        graph.stopped.push(self.name.clone());
        Ok(0)
    }
}
