use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use common::prelude::SearchRequest;

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBody {
    pub owner: String,
    #[serde(flatten)]
    pub search: SearchRequest,
}

/// Responds with `SearchResults`; `searched` is false when no filter was set
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<SearchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state.drive().search(&req.owner, &req.search).await?;
    Ok((http::StatusCode::OK, Json(results)))
}
