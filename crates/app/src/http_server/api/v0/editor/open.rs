use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use common::prelude::Node;

use super::EditorSession;
use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {
    pub node: Node,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(session): Json<EditorSession>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state
        .drive()
        .open_editor(&session.owner, &session.client, &session.node_id)
        .await?;

    Ok((http::StatusCode::OK, Json(OpenResponse { node })))
}
