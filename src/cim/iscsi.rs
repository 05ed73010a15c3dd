//! iSCSI topology: portals, targets, sessions, connections and the disks behind them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::client::{ignore_not_found, CimError, ManagementClient, MethodResult};
use super::correlate::{build_mapping, correlate, CorrelationError, MappingTable};
use super::disk::{list_disks, DISK_OBJECT_ID_INDEXER};
use super::indexer::{object_ref, string_property, ObjectRefIndexer, StringPropertyIndexer};
use super::query::{Filter, Query};
use super::record::Record;
use super::NAMESPACE_STORAGE;

pub const TARGET_PORTAL_CLASS: &str = "MSFT_iSCSITargetPortal";
pub const TARGET_CLASS: &str = "MSFT_iSCSITarget";
pub const SESSION_CLASS: &str = "MSFT_iSCSISession";
pub const CONNECTION_CLASS: &str = "MSFT_iSCSIConnection";

pub const TARGET_TO_PORTAL_ASSOCIATION: &str = "MSFT_iSCSITargetToiSCSITargetPortal";
pub const TARGET_TO_CONNECTION_ASSOCIATION: &str = "MSFT_iSCSITargetToiSCSIConnection";
pub const TARGET_TO_SESSION_ASSOCIATION: &str = "MSFT_iSCSITargetToiSCSISession";
pub const CONNECTION_TO_DISK_ASSOCIATION: &str = "MSFT_iSCSIConnectionToDisk";

// Association side indexers, keyed by the reference each row carries.
const MAPPING_TARGET_INDEXER: ObjectRefIndexer = object_ref("iSCSITarget", TARGET_CLASS, "NodeAddress");
const MAPPING_PORTAL_INDEXER: ObjectRefIndexer =
    object_ref("iSCSITargetPortal", TARGET_PORTAL_CLASS, "TargetPortalAddress");
const MAPPING_CONNECTION_INDEXER: ObjectRefIndexer =
    object_ref("iSCSIConnection", CONNECTION_CLASS, "ConnectionIdentifier");
const MAPPING_SESSION_INDEXER: ObjectRefIndexer = object_ref("iSCSISession", SESSION_CLASS, "SessionIdentifier");
const MAPPING_DISK_INDEXER: ObjectRefIndexer = object_ref("Disk", "MSFT_Disk", "ObjectId");

// Instance indexers.
const TARGET_INDEXER: StringPropertyIndexer = string_property("NodeAddress");
const PORTAL_INDEXER: StringPropertyIndexer = string_property("TargetPortalAddress");
const CONNECTION_INDEXER: StringPropertyIndexer = string_property("ConnectionIdentifier");
const SESSION_INDEXER: StringPropertyIndexer = string_property("SessionIdentifier");

/// Lists every configured target portal.
pub async fn list_target_portals(client: &dyn ManagementClient, selectors: &[&str]) -> Result<Vec<Record>, CimError> {
    let q = Query::new(NAMESPACE_STORAGE, TARGET_PORTAL_CLASS).select(selectors.iter().copied());
    ignore_not_found(client.query_instances(&q).await)
}

/// Finds the target portal listening at `address:port`.
pub async fn query_target_portal(
    client: &dyn ManagementClient,
    address: &str,
    port: u32,
    selectors: &[&str],
) -> Result<Record, CimError> {
    let q = Query::new(NAMESPACE_STORAGE, TARGET_PORTAL_CLASS)
        .select(selectors.iter().copied())
        .filter("TargetPortalAddress", address)
        .filter("TargetPortalPortNumber", port.to_string());
    first(client.query_instances(&q).await?, &q)
}

/// Parameters of a new target portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTargetPortal {
    pub address: String,
    pub port: u32,
    #[serde(default)]
    pub initiator_instance_name: Option<String>,
    #[serde(default)]
    pub initiator_portal_address: Option<String>,
    #[serde(default)]
    pub is_header_digest: Option<bool>,
    #[serde(default)]
    pub is_data_digest: Option<bool>,
}

/// Registers a target portal and returns the resulting instance.
pub async fn new_target_portal(client: &dyn ManagementClient, portal: &NewTargetPortal) -> Result<Record, CimError> {
    let mut params = Map::new();
    params.insert("TargetPortalAddress".into(), Value::from(portal.address.clone()));
    params.insert("TargetPortalPortNumber".into(), Value::from(portal.port));
    if let Some(v) = &portal.initiator_instance_name {
        params.insert("InitiatorInstanceName".into(), Value::from(v.clone()));
    }
    if let Some(v) = &portal.initiator_portal_address {
        params.insert("InitiatorPortalAddress".into(), Value::from(v.clone()));
    }
    if let Some(v) = portal.is_header_digest {
        params.insert("IsHeaderDigest".into(), Value::from(v));
    }
    if let Some(v) = portal.is_data_digest {
        params.insert("IsDataDigest".into(), Value::from(v));
    }

    let result = client
        .invoke_class_method(NAMESPACE_STORAGE, TARGET_PORTAL_CLASS, "New", params)
        .await?;
    if result.return_value != 0 {
        return Err(CimError::Method {
            class: TARGET_PORTAL_CLASS.to_string(),
            method: "New".to_string(),
            reason: format!(
                "portal {}:{} was not created, result: {}",
                portal.address, portal.port, result.return_value
            ),
        });
    }

    query_target_portal(client, &portal.address, portal.port, &[]).await
}

/// Mapping from target node address to target portal address.
pub async fn target_to_portal_mapping(client: &dyn ManagementClient) -> Result<MappingTable, CorrelationError> {
    let q = Query::new(NAMESPACE_STORAGE, TARGET_TO_PORTAL_ASSOCIATION);
    build_mapping(client, &q, &MAPPING_TARGET_INDEXER, &MAPPING_PORTAL_INDEXER).await
}

/// Mapping from connection identifier to target node address.
pub async fn connection_to_target_mapping(client: &dyn ManagementClient) -> Result<MappingTable, CorrelationError> {
    let q = Query::new(NAMESPACE_STORAGE, TARGET_TO_CONNECTION_ASSOCIATION);
    build_mapping(client, &q, &MAPPING_CONNECTION_INDEXER, &MAPPING_TARGET_INDEXER).await
}

/// Mapping from session identifier to target node address.
pub async fn session_to_target_mapping(client: &dyn ManagementClient) -> Result<MappingTable, CorrelationError> {
    let q = Query::new(NAMESPACE_STORAGE, TARGET_TO_SESSION_ASSOCIATION);
    build_mapping(client, &q, &MAPPING_SESSION_INDEXER, &MAPPING_TARGET_INDEXER).await
}

/// Mapping from disk object id to connection identifier.
pub async fn disk_to_connection_mapping(client: &dyn ManagementClient) -> Result<MappingTable, CorrelationError> {
    let q = Query::new(NAMESPACE_STORAGE, CONNECTION_TO_DISK_ASSOCIATION);
    build_mapping(client, &q, &MAPPING_DISK_INDEXER, &MAPPING_CONNECTION_INDEXER).await
}

/// Lists the targets reachable through any of `portals`, narrowed by `filters`.
pub async fn list_targets_by_portals(
    client: &dyn ManagementClient,
    selectors: &[&str],
    portals: &[Record],
    filters: Vec<Filter>,
) -> Result<Vec<Record>, CorrelationError> {
    let q = Query::new(NAMESPACE_STORAGE, TARGET_CLASS)
        .select(selectors.iter().copied())
        .with_filters(filters);
    let targets = ignore_not_found(client.query_instances(&q).await)?;
    if targets.is_empty() || portals.is_empty() {
        return Ok(Vec::new());
    }

    let mapping = target_to_portal_mapping(client).await?;
    correlate(targets, &TARGET_INDEXER, portals, &PORTAL_INDEXER, &mapping)
}

/// Finds the target `node_address` behind the portal at `address:port`.
pub async fn query_target(
    client: &dyn ManagementClient,
    address: &str,
    port: u32,
    node_address: &str,
    selectors: &[&str],
) -> Result<Record, CorrelationError> {
    let portal = query_target_portal(client, address, port, &[]).await?;
    let q = Query::new(NAMESPACE_STORAGE, TARGET_CLASS).filter("NodeAddress", node_address);
    let targets = list_targets_by_portals(
        client,
        selectors,
        std::slice::from_ref(&portal),
        q.filters().to_vec(),
    )
    .await?;
    Ok(first(targets, &q)?)
}

/// Finds the session established with `target`.
pub async fn query_session_by_target(
    client: &dyn ManagementClient,
    target: &Record,
    selectors: &[&str],
) -> Result<Record, CorrelationError> {
    let q = Query::new(NAMESPACE_STORAGE, SESSION_CLASS).select(selectors.iter().copied());
    let sessions = client.query_instances(&q).await?;
    let mapping = session_to_target_mapping(client).await?;
    let matched = correlate(
        sessions,
        &SESSION_INDEXER,
        std::slice::from_ref(target),
        &TARGET_INDEXER,
        &mapping,
    )?;
    Ok(first(matched, &q)?)
}

/// Lists the connections established with any of `targets`.
pub async fn list_connections_by_targets(
    client: &dyn ManagementClient,
    targets: &[Record],
) -> Result<Vec<Record>, CorrelationError> {
    let q = Query::new(NAMESPACE_STORAGE, CONNECTION_CLASS);
    let connections = ignore_not_found(client.query_instances(&q).await)?;
    if connections.is_empty() || targets.is_empty() {
        return Ok(Vec::new());
    }

    let mapping = connection_to_target_mapping(client).await?;
    correlate(connections, &CONNECTION_INDEXER, targets, &TARGET_INDEXER, &mapping)
}

/// Lists the disks exposed through any of `connections`.
pub async fn list_disks_by_connections(
    client: &dyn ManagementClient,
    connections: &[Record],
    selectors: &[&str],
) -> Result<Vec<Record>, CorrelationError> {
    if connections.is_empty() {
        return Ok(Vec::new());
    }
    let disks = list_disks(client, selectors).await?;
    let mapping = disk_to_connection_mapping(client).await?;
    correlate(disks, &DISK_OBJECT_ID_INDEXER, connections, &CONNECTION_INDEXER, &mapping)
}

/// Lists the disks on `target`: target -> connections -> disks.
pub async fn list_disks_by_target(
    client: &dyn ManagementClient,
    target: &Record,
    selectors: &[&str],
) -> Result<Vec<Record>, CorrelationError> {
    let connections = list_connections_by_targets(client, std::slice::from_ref(target)).await?;
    list_disks_by_connections(client, &connections, selectors).await
}

/// Lists the disks reachable from `portal`: portal -> targets -> connections -> disks.
pub async fn list_disks_by_portal(
    client: &dyn ManagementClient,
    portal: &Record,
    selectors: &[&str],
) -> Result<Vec<Record>, CorrelationError> {
    let targets = list_targets_by_portals(client, &[], std::slice::from_ref(portal), Vec::new()).await?;
    let connections = list_connections_by_targets(client, &targets).await?;
    list_disks_by_connections(client, &connections, selectors).await
}

/// CHAP authentication type accepted by `MSFT_iSCSITarget.Connect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthType {
    #[default]
    None,
    OneWayChap,
    MutualChap,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "NONE",
            AuthType::OneWayChap => "ONEWAYCHAP",
            AuthType::MutualChap => "MUTUALCHAP",
        }
    }
}

/// Parameters of a target connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectTarget {
    pub portal_address: String,
    pub portal_port: u32,
    pub node_address: String,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub chap_username: Option<String>,
    #[serde(default)]
    pub chap_secret: Option<String>,
}

/// Connects to a target, optionally with CHAP credentials.
pub async fn connect_target(client: &dyn ManagementClient, target: &ConnectTarget) -> Result<MethodResult, CimError> {
    let mut params = Map::new();
    params.insert("NodeAddress".into(), Value::from(target.node_address.clone()));
    params.insert("TargetPortalAddress".into(), Value::from(target.portal_address.clone()));
    params.insert("TargetPortalPortNumber".into(), Value::from(target.portal_port));
    params.insert("AuthenticationType".into(), Value::from(target.auth_type.as_str()));
    if let Some(v) = &target.chap_username {
        params.insert("ChapUsername".into(), Value::from(v.clone()));
    }
    if let Some(v) = &target.chap_secret {
        params.insert("ChapSecret".into(), Value::from(v.clone()));
    }

    client
        .invoke_class_method(NAMESPACE_STORAGE, TARGET_CLASS, "Connect", params)
        .await
}

/// TargetPortal is the API view of an `MSFT_iSCSITargetPortal` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPortal {
    pub address: String,
    pub port: u32,
}

impl TryFrom<&Record> for TargetPortal {
    type Error = CimError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            address: record.string("TargetPortalAddress")?,
            port: record.u32("TargetPortalPortNumber")?,
        })
    }
}

/// Target is the API view of an `MSFT_iSCSITarget` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub node_address: String,
    pub is_connected: bool,
}

impl TryFrom<&Record> for Target {
    type Error = CimError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            node_address: record.string("NodeAddress")?,
            is_connected: record.bool("IsConnected").unwrap_or(false),
        })
    }
}

fn first(records: Vec<Record>, q: &Query) -> Result<Record, CimError> {
    records.into_iter().next().ok_or_else(|| CimError::NotFound {
        namespace: q.namespace().to_string(),
        query: q.to_wql(),
    })
}
