// Resource handles for host services.

use async_trait::async_trait;
use serde_json::Map;
use std::sync::Arc;

use crate::cim::{ignore_not_found, CimError, ManagementClient, Query, Record, NAMESPACE_CIMV2};

pub const SERVICE_CLASS: &str = "Win32_Service";
pub const DEPENDENT_SERVICE_ASSOCIATION: &str = "Win32_DependentService";

/// Service is a handle to one host service.
#[async_trait]
pub trait Service: Send + Sync {
    async fn name(&self) -> Result<String, CimError>;

    async fn display_name(&self) -> Result<String, CimError>;

    /// Current state, e.g. `Running` or `Stopped`.
    async fn state(&self) -> Result<String, CimError>;

    async fn start_mode(&self) -> Result<String, CimError>;

    /// Services that depend on this one.
    async fn dependents(&self) -> Result<Vec<Arc<dyn Service>>, CimError>;

    /// Requests a start and returns the OS result code.
    async fn start_service(&self) -> Result<u32, CimError>;

    /// Requests a stop and returns the OS result code.
    async fn stop_service(&self) -> Result<u32, CimError>;
}

/// ServiceFactory resolves services by name.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    async fn get_service(&self, name: &str) -> Result<Arc<dyn Service>, CimError>;
}

/// Win32Service is a `Win32_Service` instance. Its properties are a snapshot taken when
/// the handle was resolved.
pub struct Win32Service {
    client: Arc<dyn ManagementClient>,
    record: Record,
}

impl Win32Service {
    pub fn new(client: Arc<dyn ManagementClient>, record: Record) -> Self {
        Self { client, record }
    }

    fn by_name(name: &str) -> Query {
        Query::new(NAMESPACE_CIMV2, SERVICE_CLASS).filter("Name", name)
    }

    async fn invoke(&self, method: &str) -> Result<u32, CimError> {
        let name = self.record.string("Name")?;
        let result = self
            .client
            .invoke_instance_method(&Self::by_name(&name), method, Map::new())
            .await?;
        Ok(result.return_value)
    }
}

#[async_trait]
impl Service for Win32Service {
    async fn name(&self) -> Result<String, CimError> {
        self.record.string("Name")
    }

    async fn display_name(&self) -> Result<String, CimError> {
        self.record.string("DisplayName")
    }

    async fn state(&self) -> Result<String, CimError> {
        self.record.string("State")
    }

    async fn start_mode(&self) -> Result<String, CimError> {
        self.record.string("StartMode")
    }

    async fn dependents(&self) -> Result<Vec<Arc<dyn Service>>, CimError> {
        let name = self.record.string("Name")?;
        let records = ignore_not_found(
            self.client
                .query_associated(&Self::by_name(&name), DEPENDENT_SERVICE_ASSOCIATION, "Antecedent")
                .await,
        )?;

        Ok(records
            .into_iter()
            .map(|record| Arc::new(Win32Service::new(self.client.clone(), record)) as Arc<dyn Service>)
            .collect())
    }

    async fn start_service(&self) -> Result<u32, CimError> {
        self.invoke("StartService").await
    }

    async fn stop_service(&self) -> Result<u32, CimError> {
        self.invoke("StopService").await
    }
}

/// CimServiceFactory resolves `Win32_Service` instances through the management client.
pub struct CimServiceFactory {
    client: Arc<dyn ManagementClient>,
}

impl CimServiceFactory {
    pub fn new(client: Arc<dyn ManagementClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceFactory for CimServiceFactory {
    async fn get_service(&self, name: &str) -> Result<Arc<dyn Service>, CimError> {
        let records = self.client.query_instances(&Win32Service::by_name(name)).await?;
        let record = records.into_iter().next().ok_or_else(|| CimError::NotFound {
            namespace: NAMESPACE_CIMV2.to_string(),
            query: Win32Service::by_name(name).to_wql(),
        })?;
        Ok(Arc::new(Win32Service::new(self.client.clone(), record)))
    }
}
