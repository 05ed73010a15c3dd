// Package system manages host services and exposes host identity.

pub mod api;
pub mod error;
pub mod manager;
pub mod service;

#[cfg(test)]
mod api_test;

pub use api::{service_status, start_type, ServiceInfo, SystemApi, DEFAULT_CHECK_INTERVAL, DEFAULT_CHECK_TIMEOUT};
pub use error::{DependentsRunning, LifecycleError};
pub use manager::{wait_until_state, ServiceManager, StateCheck, SERVICE_STATE_RUNNING, SERVICE_STATE_STOPPED};
pub use service::{CimServiceFactory, Service, ServiceFactory, Win32Service};
