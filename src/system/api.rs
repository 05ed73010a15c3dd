// System API: BIOS identity and service lifecycle.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::error::{DependentsRunning, LifecycleError};
use super::manager::{wait_until_state, ServiceManager, StateCheck, SERVICE_STATE_RUNNING, SERVICE_STATE_STOPPED};
use super::service::{Service, ServiceFactory, SERVICE_CLASS};
use crate::cim::{CimError, ManagementClient, Query, NAMESPACE_CIMV2};

/// Start request accepted.
const START_SERVICE_ACCEPTED: u32 = 0;
/// Service is already running.
const START_SERVICE_ALREADY_RUNNING: u32 = 10;
/// Stop request accepted.
const STOP_SERVICE_ACCEPTED: u32 = 0;
/// The service is in a pending state.
const STOP_SERVICE_PENDING: u32 = 5;
/// Dependent services are still running.
const STOP_SERVICE_DEPENDENT_RUNNING: u32 = 3;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// ServiceInfo describes a service with numeric start type and status codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub display_name: String,
    pub start_type: u32,
    pub status: u32,
}

/// Maps a `StartMode` string to its start type code.
pub fn start_type(start_mode: &str) -> u32 {
    match start_mode {
        "Boot" => 0,
        "System" => 1,
        "Auto" => 2,
        "Manual" => 3,
        "Disabled" => 4,
        _ => 0,
    }
}

/// Maps a `State` string to its status code.
pub fn service_status(state: &str) -> u32 {
    match state {
        "Stopped" => 1,
        "Start Pending" => 2,
        "Stop Pending" => 3,
        "Running" => 4,
        "Continue Pending" => 5,
        "Pause Pending" => 6,
        "Paused" => 7,
        _ => 0,
    }
}

/// SystemApi implements the system API group on top of the management client.
pub struct SystemApi {
    client: Arc<dyn ManagementClient>,
    factory: Arc<dyn ServiceFactory>,
    manager: ServiceManager,
    check_interval: Duration,
    check_timeout: Duration,
}

impl SystemApi {
    pub fn new(
        client: Arc<dyn ManagementClient>,
        factory: Arc<dyn ServiceFactory>,
        check_interval: Duration,
        check_timeout: Duration,
    ) -> Self {
        Self {
            client,
            manager: ServiceManager::new(factory.clone()),
            factory,
            check_interval,
            check_timeout,
        }
    }

    pub async fn bios_serial_number(&self) -> Result<String, CimError> {
        let q = Query::new(NAMESPACE_CIMV2, "CIM_BIOSElement").select(["SerialNumber"]);
        let records = self.client.query_instances(&q).await?;
        match records.first() {
            Some(bios) => bios.string("SerialNumber"),
            None => Err(CimError::NotFound {
                namespace: NAMESPACE_CIMV2.to_string(),
                query: q.to_wql(),
            }),
        }
    }

    pub async fn get_service(&self, name: &str) -> Result<ServiceInfo, CimError> {
        let q = Query::new(NAMESPACE_CIMV2, SERVICE_CLASS)
            .select(["DisplayName", "State", "StartMode"])
            .filter("Name", name);
        let records = self.client.query_instances(&q).await?;
        let service = records.first().ok_or_else(|| CimError::NotFound {
            namespace: NAMESPACE_CIMV2.to_string(),
            query: q.to_wql(),
        })?;

        Ok(ServiceInfo {
            display_name: service.string("DisplayName")?,
            start_type: start_type(&service.string("StartMode")?),
            status: service_status(&service.string("State")?),
        })
    }

    /// Starts the service and waits until it is running. Already running is success.
    pub async fn start_service(&self, name: &str) -> Result<(), LifecycleError> {
        let owned = name.to_string();
        let start = move |service: Arc<dyn Service>| async move {
            let ret = service.start_service().await?;
            if ret != START_SERVICE_ACCEPTED && ret != START_SERVICE_ALREADY_RUNNING {
                return Err(anyhow!("error starting service {}, return value: {}", owned, ret));
            }
            Ok(())
        };

        info!(component = "system", event = "start_requested", service = name, "starting service");
        let result = wait_until_state(
            start,
            || self.check_state(name, SERVICE_STATE_RUNNING),
            self.check_interval,
            self.check_timeout,
        )
        .await;

        match result {
            Ok(state) => {
                info!(component = "system", event = "state_reached", service = name, state = %state, "service is running");
                Ok(())
            }
            Err(LifecycleError::Timeout { state }) if state == SERVICE_STATE_RUNNING => Ok(()),
            Err(e) => {
                warn!(component = "system", event = "start_failed", service = name, error = %e, "service did not start");
                Err(e)
            }
        }
    }

    /// Stops the service. With `force`, running dependents that block the stop are stopped
    /// first, deepest dependents first.
    pub async fn stop_service(&self, name: &str, force: bool) -> Result<(), LifecycleError> {
        let err = match self.stop_single_service(name).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !force || !matches!(err, LifecycleError::DependentBlocked { .. }) {
            return Err(err);
        }

        let names = self.manager.dependents_for_service(name).await?;
        info!(
            component = "system",
            event = "cascading_stop",
            service = name,
            dependents = ?names,
            "stopping running dependents"
        );

        for service_name in &names {
            self.stop_single_service(service_name).await?;
        }

        Ok(())
    }

    async fn stop_single_service(&self, name: &str) -> Result<(), LifecycleError> {
        let owned = name.to_string();
        let stop = move |service: Arc<dyn Service>| async move {
            let ret = service.stop_service().await?;
            match ret {
                STOP_SERVICE_ACCEPTED | STOP_SERVICE_PENDING => Ok(()),
                STOP_SERVICE_DEPENDENT_RUNNING => Err(DependentsRunning { name: owned }.into()),
                other => Err(anyhow!("error stopping service {}, return value: {}", owned, other)),
            }
        };

        info!(component = "system", event = "stop_requested", service = name, "stopping service");
        let result = wait_until_state(
            stop,
            || self.check_state(name, SERVICE_STATE_STOPPED),
            self.check_interval,
            self.check_timeout,
        )
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(LifecycleError::Timeout { state }) if state == SERVICE_STATE_STOPPED => Ok(()),
            Err(LifecycleError::Transition { source, .. }) if source.is::<DependentsRunning>() => {
                Err(LifecycleError::DependentBlocked { name: name.to_string() })
            }
            Err(e) => {
                warn!(component = "system", event = "stop_failed", service = name, error = %e, "service did not stop");
                Err(e)
            }
        }
    }

    async fn check_state(&self, name: &str, desired: &str) -> anyhow::Result<StateCheck<Arc<dyn Service>>> {
        let service = self.factory.get_service(name).await?;
        let state = service.state().await?;
        Ok(StateCheck {
            done: state == desired,
            state,
            resource: service,
        })
    }
}
