use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::node::ValidationError;
use common::prelude::DriveError;

/// Error returned by every v0 handler
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub DriveError);

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError(err.into())
    }
}

pub fn status_for(err: &DriveError) -> StatusCode {
    match err {
        DriveError::LockConflict { .. } => StatusCode::CONFLICT,
        DriveError::NotFound(_) => StatusCode::NOT_FOUND,
        DriveError::NotOwner => StatusCode::FORBIDDEN,
        DriveError::Unauthorized => StatusCode::UNAUTHORIZED,
        DriveError::InvalidNodeType(_)
        | DriveError::AlreadyContained(_)
        | DriveError::ContainmentCycle(_)
        | DriveError::Validation(_) => StatusCode::BAD_REQUEST,
        DriveError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DriveError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError(err) = self;
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::warn!(%status, "request failed upstream: {}", err);
        }

        let body = match &err {
            DriveError::LockConflict {
                remaining_secs,
                holder,
            } => serde_json::json!({
                "msg": err.to_string(),
                "remaining_secs": remaining_secs,
                "holder": holder,
            }),
            _ => serde_json::json!({ "msg": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
