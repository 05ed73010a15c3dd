// Package controller provides the smb API group controller.

use axum::{
    extract::Query,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::controller::Controller;
use super::response::ApiError;
use crate::smb::SmbApi;

#[derive(Debug, Deserialize)]
struct RemotePathQuery {
    remote_path: String,
}

#[derive(Debug, Deserialize)]
struct NewGlobalMapping {
    remote_path: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct NewLink {
    remote_path: String,
    local_path: String,
}

/// SmbController serves SMB global mapping and link requests.
#[derive(Clone)]
pub struct SmbController {
    api: Arc<SmbApi>,
}

impl SmbController {
    pub fn new(api: Arc<SmbApi>) -> Self {
        Self { api }
    }

    async fn is_mapped(&self, q: RemotePathQuery) -> Result<Json<Value>, ApiError> {
        let mapped = self.api.is_smb_mapped(&q.remote_path).await?;
        Ok(Json(json!({ "remote_path": q.remote_path, "mapped": mapped })))
    }

    async fn new_global_mapping(&self, req: NewGlobalMapping) -> Result<StatusCode, ApiError> {
        self.api
            .new_smb_global_mapping(&req.remote_path, &req.username, &req.password)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn remove_global_mapping(&self, q: RemotePathQuery) -> Result<StatusCode, ApiError> {
        self.api.remove_smb_global_mapping(&q.remote_path).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn new_link(&self, req: NewLink) -> Result<StatusCode, ApiError> {
        self.api.new_smb_link(&req.remote_path, &req.local_path).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

impl Controller for SmbController {
    fn add_route(&self, router: Router) -> Router {
        let (check, create, remove, link) = (self.clone(), self.clone(), self.clone(), self.clone());

        router
            .route(
                "/v1/smb/global-mappings",
                get(move |Query(q): Query<RemotePathQuery>| {
                    let controller = check.clone();
                    async move { controller.is_mapped(q).await }
                })
                .post(move |Json(req): Json<NewGlobalMapping>| {
                    let controller = create.clone();
                    async move { controller.new_global_mapping(req).await }
                })
                .delete(move |Query(q): Query<RemotePathQuery>| {
                    let controller = remove.clone();
                    async move { controller.remove_global_mapping(q).await }
                }),
            )
            .route(
                "/v1/smb/links",
                post(move |Json(req): Json<NewLink>| {
                    let controller = link.clone();
                    async move { controller.new_link(req).await }
                }),
            )
    }
}
