// Error definitions for the service lifecycle controller.

use crate::cim::CimError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The state probe failed; polling is not retried.
    #[error("state check failed (last observed state {state:?}): {source}")]
    Check {
        state: String,
        #[source]
        source: anyhow::Error,
    },
    /// The requested transition was refused before any polling began.
    #[error("state transition failed in state {state:?}: {source}")]
    Transition {
        state: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("timed out waiting for the desired state (last observed state {state:?})")]
    Timeout { state: String },
    #[error("service {name} cannot be stopped while its dependent services are running")]
    DependentBlocked { name: String },
    #[error(transparent)]
    Cim(#[from] CimError),
}

impl LifecycleError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LifecycleError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LifecycleError::Cim(e) if e.is_not_found())
    }
}

/// Returned by a stop transition refused because dependents are still running.
#[derive(Debug, thiserror::Error)]
#[error("dependent services of {name} are still running")]
pub struct DependentsRunning {
    pub name: String,
}
