use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use common::node::parse_tags;
use common::prelude::Node;

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsRequest {
    pub owner: String,
    pub node_id: String,
    /// Comma-separated replacement tag list
    pub tags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsResponse {
    pub node: Node,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<TagsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = parse_tags(&req.tags)?;
    let node = state
        .drive()
        .update_tags(&req.owner, &req.node_id, &tags)
        .await?;

    Ok((http::StatusCode::OK, Json(TagsResponse { node })))
}
