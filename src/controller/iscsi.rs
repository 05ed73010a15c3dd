// Package controller provides the iscsi API group controller.

use axum::{
    extract::Query,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::controller::Controller;
use super::response::ApiError;
use crate::cim::disk::Disk;
use crate::cim::iscsi::{ConnectTarget, NewTargetPortal, Target, TargetPortal};
use crate::iscsi::IscsiApi;

const DEFAULT_PORT: u32 = 3260;

fn default_port() -> u32 {
    DEFAULT_PORT
}

#[derive(Debug, Deserialize)]
struct PortalQuery {
    address: String,
    #[serde(default = "default_port")]
    port: u32,
}

#[derive(Debug, Deserialize)]
struct TargetQuery {
    address: String,
    #[serde(default = "default_port")]
    port: u32,
    node_address: String,
}

/// IscsiController serves portal, target and disk topology requests.
#[derive(Clone)]
pub struct IscsiController {
    api: Arc<IscsiApi>,
}

impl IscsiController {
    pub fn new(api: Arc<IscsiApi>) -> Self {
        Self { api }
    }

    async fn list_target_portals(&self) -> Result<Json<Vec<TargetPortal>>, ApiError> {
        Ok(Json(self.api.list_target_portals().await?))
    }

    async fn add_target_portal(&self, portal: NewTargetPortal) -> Result<(StatusCode, Json<TargetPortal>), ApiError> {
        let created = self.api.add_target_portal(&portal).await?;
        Ok((StatusCode::CREATED, Json(created)))
    }

    async fn discover_targets(&self, q: PortalQuery) -> Result<Json<Vec<Target>>, ApiError> {
        Ok(Json(self.api.discover_targets(&q.address, q.port).await?))
    }

    async fn connect_target(&self, target: ConnectTarget) -> Result<StatusCode, ApiError> {
        self.api.connect_target(&target).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn list_disks(&self, q: TargetQuery) -> Result<Json<Vec<Disk>>, ApiError> {
        Ok(Json(self.api.list_disks(&q.address, q.port, &q.node_address).await?))
    }

    async fn list_portal_disks(&self, q: PortalQuery) -> Result<Json<Vec<Disk>>, ApiError> {
        Ok(Json(self.api.list_portal_disks(&q.address, q.port).await?))
    }
}

impl Controller for IscsiController {
    fn add_route(&self, router: Router) -> Router {
        let (list, add, discover, connect, disks, portal_disks) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );

        router
            .route(
                "/v1/iscsi/target-portals",
                get(move || {
                    let controller = list.clone();
                    async move { controller.list_target_portals().await }
                })
                .post(move |Json(portal): Json<NewTargetPortal>| {
                    let controller = add.clone();
                    async move { controller.add_target_portal(portal).await }
                }),
            )
            .route(
                "/v1/iscsi/targets",
                get(move |Query(q): Query<PortalQuery>| {
                    let controller = discover.clone();
                    async move { controller.discover_targets(q).await }
                }),
            )
            .route(
                "/v1/iscsi/targets/connect",
                post(move |Json(target): Json<ConnectTarget>| {
                    let controller = connect.clone();
                    async move { controller.connect_target(target).await }
                }),
            )
            .route(
                "/v1/iscsi/disks",
                get(move |Query(q): Query<TargetQuery>| {
                    let controller = disks.clone();
                    async move { controller.list_disks(q).await }
                }),
            )
            .route(
                "/v1/iscsi/portal-disks",
                get(move |Query(q): Query<PortalQuery>| {
                    let controller = portal_disks.clone();
                    async move { controller.list_portal_disks(q).await }
                }),
            )
    }
}
