use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use super::EditorSession;
use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

/// Responds with a `ConflictStatus`; polled by open editor tabs
pub async fn handler(
    State(state): State<ServiceState>,
    Json(session): Json<EditorSession>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .drive()
        .check_conflict(&session.owner, &session.client, &session.node_id)
        .await?;

    Ok((http::StatusCode::OK, Json(status)))
}
