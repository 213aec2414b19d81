use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub owner: String,
    pub node_id: String,
    /// Destination directory; the root when absent
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    pub node_id: String,
    pub to: Option<String>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<MoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .drive()
        .move_node(&req.owner, &req.node_id, req.to.as_deref())
        .await?;

    Ok((
        http::StatusCode::OK,
        Json(MoveResponse {
            node_id: req.node_id,
            to: req.to,
        }),
    ))
}
