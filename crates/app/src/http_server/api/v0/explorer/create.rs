use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use common::prelude::{NewNode, Node};

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub owner: String,
    pub node: NewNode,
    /// Directory to create the node in; root when absent
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub node: Node,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<CreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state
        .drive()
        .create_node(&req.owner, req.node, req.parent.as_deref())
        .await?;

    Ok((http::StatusCode::CREATED, Json(CreateResponse { node })))
}
