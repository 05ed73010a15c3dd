//! Disk instances of the storage namespace.

use serde::{Deserialize, Serialize};

use super::client::{ignore_not_found, CimError, ManagementClient};
use super::indexer::{string_property, StringPropertyIndexer};
use super::query::Query;
use super::record::Record;
use super::NAMESPACE_STORAGE;

pub const DISK_CLASS: &str = "MSFT_Disk";

/// Indexes disks by their object id.
pub const DISK_OBJECT_ID_INDEXER: StringPropertyIndexer = string_property("ObjectId");

/// Lists every disk of the host.
pub async fn list_disks(client: &dyn ManagementClient, selectors: &[&str]) -> Result<Vec<Record>, CimError> {
    let q = Query::new(NAMESPACE_STORAGE, DISK_CLASS).select(selectors.iter().copied());
    ignore_not_found(client.query_instances(&q).await)
}

/// Disk is the API view of an `MSFT_Disk` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub number: u32,
    pub object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl TryFrom<&Record> for Disk {
    type Error = CimError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            number: record.u32("Number")?,
            object_id: record.string("ObjectId")?,
            friendly_name: record.string("FriendlyName").ok(),
            size: record.u64("Size").ok(),
        })
    }
}
