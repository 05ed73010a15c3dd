// API groups assembled from controllers.

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::controller::Controller;
use crate::server::{ApiGroup, VersionedApi};

/// ControllerGroup serves a set of controllers as one versioned API.
pub struct ControllerGroup {
    group: String,
    version: String,
    controllers: Vec<Arc<dyn Controller>>,
    request_timeout: Duration,
}

impl ControllerGroup {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        controllers: Vec<Arc<dyn Controller>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            controllers,
            request_timeout,
        }
    }
}

impl ApiGroup for ControllerGroup {
    fn versioned_apis(&self) -> Vec<VersionedApi> {
        let controllers = self.controllers.clone();
        let request_timeout = self.request_timeout;
        vec![VersionedApi::new(self.group.clone(), self.version.clone(), move |router| {
            build_router(router, &controllers, request_timeout)
        })]
    }
}

/// Builds the router with all controllers, then wraps it with tracing and a request timeout.
fn build_router(router: Router, controllers: &[Arc<dyn Controller>], request_timeout: Duration) -> Router {
    let mut router = router;
    for controller in controllers {
        router = controller.add_route(router);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
