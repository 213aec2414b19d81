use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChownRequest {
    pub owner: String,
    pub node_id: String,
    pub new_owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChownResponse {
    pub node_id: String,
    pub owner: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<ChownRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .drive()
        .change_owner(&req.owner, &req.node_id, &req.new_owner)
        .await?;

    Ok((
        http::StatusCode::OK,
        Json(ChownResponse {
            node_id: req.node_id,
            owner: req.new_owner,
        }),
    ))
}
