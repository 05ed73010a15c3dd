// Versioned API descriptors.

use axum::Router;
use std::fmt;
use std::sync::Arc;

/// Registers an API's handlers on a fresh router.
pub type Registrant = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// VersionedApi is one (group, version) protocol surface.
#[derive(Clone)]
pub struct VersionedApi {
    pub group: String,
    pub version: String,
    pub registrant: Registrant,
}

impl VersionedApi {
    pub fn new<F>(group: impl Into<String>, version: impl Into<String>, registrant: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        Self {
            group: group.into(),
            version: version.into(),
            registrant: Arc::new(registrant),
        }
    }

    /// Configuration key of the endpoint, `<group>/<version>`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }
}

impl fmt::Debug for VersionedApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedApi")
            .field("group", &self.group)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// ApiGroup exposes one or more versions of an API.
pub trait ApiGroup: Send + Sync {
    fn versioned_apis(&self) -> Vec<VersionedApi>;
}
