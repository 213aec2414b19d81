use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountRequest {
    pub owner: String,
    /// Login key derived client-side from the password
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountResponse {
    pub owner: String,
    pub deleted_nodes: usize,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<DeleteAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted_nodes = state.drive().delete_account(&req.owner, &req.key).await?;

    Ok((
        http::StatusCode::OK,
        Json(DeleteAccountResponse {
            owner: req.owner,
            deleted_nodes,
        }),
    ))
}
