// Package controller provides the system API group controller.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::controller::Controller;
use super::response::ApiError;
use crate::system::{ServiceInfo, SystemApi};

#[derive(Debug, Default, Deserialize)]
struct StopQuery {
    #[serde(default)]
    force: bool,
}

/// SystemController serves BIOS identity and service lifecycle requests.
#[derive(Clone)]
pub struct SystemController {
    api: Arc<SystemApi>,
}

impl SystemController {
    pub fn new(api: Arc<SystemApi>) -> Self {
        Self { api }
    }

    async fn bios_serial_number(&self) -> Result<Json<Value>, ApiError> {
        let serial = self.api.bios_serial_number().await?;
        Ok(Json(json!({ "serial_number": serial })))
    }

    async fn get_service(&self, name: String) -> Result<Json<ServiceInfo>, ApiError> {
        Ok(Json(self.api.get_service(&name).await?))
    }

    async fn start_service(&self, name: String) -> Result<StatusCode, ApiError> {
        self.api.start_service(&name).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn stop_service(&self, name: String, force: bool) -> Result<StatusCode, ApiError> {
        self.api.stop_service(&name, force).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

impl Controller for SystemController {
    fn add_route(&self, router: Router) -> Router {
        let bios = self.clone();
        let info = self.clone();
        let start = self.clone();
        let stop = self.clone();

        router
            .route(
                "/v1/system/bios/serial-number",
                get(move || {
                    let controller = bios.clone();
                    async move { controller.bios_serial_number().await }
                }),
            )
            .route(
                "/v1/system/services/:name",
                get(move |Path(name): Path<String>| {
                    let controller = info.clone();
                    async move { controller.get_service(name).await }
                }),
            )
            .route(
                "/v1/system/services/:name/start",
                post(move |Path(name): Path<String>| {
                    let controller = start.clone();
                    async move { controller.start_service(name).await }
                }),
            )
            .route(
                "/v1/system/services/:name/stop",
                post(move |Path(name): Path<String>, Query(q): Query<StopQuery>| {
                    let controller = stop.clone();
                    async move { controller.stop_service(name, q.force).await }
                }),
            )
    }
}
