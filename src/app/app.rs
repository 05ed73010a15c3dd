// Main proxy application implementation.

use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::cim::{ManagementClient, PowerShellClient};
use crate::config::{Config, ConfigTrait};
use crate::controller::{Controller, ControllerGroup, IscsiController, SmbController, SystemController};
use crate::iscsi::IscsiApi;
use crate::powershell::{PowerShell, ScriptRunner};
use crate::server::{ApiGroup, Server, ServerError, TcpTransport};
use crate::smb::SmbApi;
use crate::system::{CimServiceFactory, SystemApi};

pub const API_VERSION: &str = "v1";

/// Encapsulates the proxy application state.
#[derive(Clone)]
pub struct App {
    server: Arc<Server>,
}

impl App {
    /// Creates the application backed by the host's powershell.
    pub fn new(cfg: &Config) -> Self {
        let shell: Arc<dyn ScriptRunner> = Arc::new(PowerShell::new(cfg.powershell_path()));
        let client: Arc<dyn ManagementClient> = Arc::new(PowerShellClient::new(shell.clone()));
        Self::with_collaborators(cfg, client, shell)
    }

    /// Creates the application on top of the given management client and script runner.
    pub fn with_collaborators(
        cfg: &Config,
        client: Arc<dyn ManagementClient>,
        shell: Arc<dyn ScriptRunner>,
    ) -> Self {
        let request_timeout = cfg.request_timeout();

        let system = Arc::new(SystemApi::new(
            client.clone(),
            Arc::new(CimServiceFactory::new(client.clone())),
            cfg.check_interval(),
            cfg.check_timeout(),
        ));
        let iscsi = Arc::new(IscsiApi::new(client.clone()));
        let smb = Arc::new(SmbApi::new(client, shell));

        let group = |name: &str, controller: Arc<dyn Controller>| -> Arc<dyn ApiGroup> {
            Arc::new(ControllerGroup::new(name, API_VERSION, vec![controller], request_timeout))
        };
        let groups = [
            group("system", Arc::new(SystemController::new(system))),
            group("iscsi", Arc::new(IscsiController::new(iscsi))),
            group("smb", Arc::new(SmbController::new(smb))),
        ];

        let server = Server::new(Arc::new(TcpTransport::new(cfg.drain_timeout())), &cfg.endpoints(), &groups);

        Self {
            server: Arc::new(server),
        }
    }

    pub fn server(&self) -> Arc<Server> {
        self.server.clone()
    }

    /// Serves every API group until the server is stopped or an endpoint fails.
    pub async fn serve(&self, listening: Option<oneshot::Sender<()>>) -> Vec<ServerError> {
        info!(component = "app", event = "started", "application lifecycle");

        let errs = self.server.start(listening).await;
        for e in &errs {
            error!(component = "app", scope = "server", event = "serve_failed", error = %e, "server error");
        }

        info!(component = "app", event = "stopped", "application lifecycle");
        errs
    }
}
