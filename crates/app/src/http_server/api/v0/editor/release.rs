use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::EditorSession;
use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    /// False when the session no longer held the lock
    pub released: bool,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(session): Json<EditorSession>,
) -> Result<impl IntoResponse, ApiError> {
    let released = state
        .drive()
        .release(&session.owner, &session.client, &session.node_id)
        .await?;

    Ok((http::StatusCode::OK, Json(ReleaseResponse { released })))
}
