use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use common::prelude::Node;

use super::EditorSession;
use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoverResponse {
    pub node: Node,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(session): Json<EditorSession>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        owner = %session.owner,
        client = %session.client,
        node_id = %session.node_id,
        "forced editor takeover"
    );
    let node = state
        .drive()
        .force_takeover(&session.owner, &session.client, &session.node_id)
        .await?;

    Ok((http::StatusCode::OK, Json(TakeoverResponse { node })))
}
