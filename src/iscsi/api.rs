// iSCSI API group on top of the correlation engine.

use std::sync::Arc;
use tracing::info;

use crate::cim::disk::Disk;
use crate::cim::iscsi::{self, ConnectTarget, NewTargetPortal, Target, TargetPortal};
use crate::cim::{CimError, CorrelationError, Filter, ManagementClient};

const DISK_SELECTORS: &[&str] = &["Number", "ObjectId", "FriendlyName", "Size"];

#[derive(Debug, thiserror::Error)]
pub enum IscsiError {
    #[error("connecting target {node_address} failed, result: {result}")]
    Connect { node_address: String, result: u32 },
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    #[error(transparent)]
    Cim(#[from] CimError),
}

impl IscsiError {
    pub fn is_not_found(&self) -> bool {
        match self {
            IscsiError::Correlation(e) => e.is_not_found(),
            IscsiError::Cim(e) => e.is_not_found(),
            IscsiError::Connect { .. } => false,
        }
    }
}

/// IscsiApi implements the iscsi API group.
pub struct IscsiApi {
    client: Arc<dyn ManagementClient>,
}

impl IscsiApi {
    pub fn new(client: Arc<dyn ManagementClient>) -> Self {
        Self { client }
    }

    pub async fn list_target_portals(&self) -> Result<Vec<TargetPortal>, IscsiError> {
        let portals = iscsi::list_target_portals(self.client.as_ref(), &[]).await?;
        Ok(portals.iter().map(TargetPortal::try_from).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn add_target_portal(&self, portal: &NewTargetPortal) -> Result<TargetPortal, IscsiError> {
        let record = iscsi::new_target_portal(self.client.as_ref(), portal).await?;
        info!(
            component = "iscsi",
            event = "portal_added",
            address = %portal.address,
            port = portal.port,
            "target portal added"
        );
        Ok(TargetPortal::try_from(&record)?)
    }

    /// Lists the targets discovered through the portal at `address:port`.
    pub async fn discover_targets(&self, address: &str, port: u32) -> Result<Vec<Target>, IscsiError> {
        let portal = iscsi::query_target_portal(self.client.as_ref(), address, port, &[]).await?;
        let targets =
            iscsi::list_targets_by_portals(self.client.as_ref(), &[], std::slice::from_ref(&portal), Vec::<Filter>::new())
                .await?;
        Ok(targets.iter().map(Target::try_from).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn connect_target(&self, target: &ConnectTarget) -> Result<(), IscsiError> {
        let result = iscsi::connect_target(self.client.as_ref(), target).await?;
        if result.return_value != 0 {
            return Err(IscsiError::Connect {
                node_address: target.node_address.clone(),
                result: result.return_value,
            });
        }

        info!(
            component = "iscsi",
            event = "target_connected",
            node_address = %target.node_address,
            auth = target.auth_type.as_str(),
            "target connected"
        );
        Ok(())
    }

    /// Lists the disks of target `node_address` behind the portal at `address:port`.
    pub async fn list_disks(&self, address: &str, port: u32, node_address: &str) -> Result<Vec<Disk>, IscsiError> {
        let target = iscsi::query_target(self.client.as_ref(), address, port, node_address, &[]).await?;
        let disks = iscsi::list_disks_by_target(self.client.as_ref(), &target, DISK_SELECTORS).await?;
        Ok(disks.iter().map(Disk::try_from).collect::<Result<Vec<_>, _>>()?)
    }

    /// Lists every disk reachable through the portal at `address:port`.
    pub async fn list_portal_disks(&self, address: &str, port: u32) -> Result<Vec<Disk>, IscsiError> {
        let portal = iscsi::query_target_portal(self.client.as_ref(), address, port, &[]).await?;
        let disks = iscsi::list_disks_by_portal(self.client.as_ref(), &portal, DISK_SELECTORS).await?;
        Ok(disks.iter().map(Disk::try_from).collect::<Result<Vec<_>, _>>()?)
    }
}
