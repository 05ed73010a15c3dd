// JSON error replies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::cim::CimError;
use crate::iscsi::IscsiError;
use crate::smb::SmbError;
use crate::system::LifecycleError;

/// ApiError is rendered as `{ "status": <code>, "message": <text> }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn classify(not_found: bool, err: &dyn std::error::Error) -> Self {
        let status = if not_found {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(
                component = "controller",
                event = "request_failed",
                status = self.status.as_u16(),
                error = %self.message,
                "request failed"
            );
        }

        let body = json!({
            "status": self.status.as_u16(),
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<CimError> for ApiError {
    fn from(err: CimError) -> Self {
        Self::classify(err.is_not_found(), &err)
    }
}

impl From<IscsiError> for ApiError {
    fn from(err: IscsiError) -> Self {
        Self::classify(err.is_not_found(), &err)
    }
}

impl From<SmbError> for ApiError {
    fn from(err: SmbError) -> Self {
        Self::classify(err.is_not_found(), &err)
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match &err {
            LifecycleError::DependentBlocked { .. } => Self::new(StatusCode::CONFLICT, err.to_string()),
            LifecycleError::Timeout { .. } => Self::new(StatusCode::GATEWAY_TIMEOUT, err.to_string()),
            _ => Self::classify(err.is_not_found(), &err),
        }
    }
}
