use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use common::node::parse_tags;
use common::prelude::{FileEdit, Node};

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub owner: String,
    pub client: String,
    pub node_id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Comma-separated, as the editor form submits them
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub node: Node,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<SaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let edit = FileEdit {
        text: req.text,
        tags: req.tags.as_deref().map(parse_tags).transpose()?,
        name: req.name,
    };

    let node = state
        .drive()
        .autosave(&req.owner, &req.client, &req.node_id, edit)
        .await?;

    Ok((http::StatusCode::OK, Json(SaveResponse { node })))
}
