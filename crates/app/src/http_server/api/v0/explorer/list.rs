use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use common::prelude::ListingRequest;

use crate::http_server::api::v0::ApiError;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest {
    pub owner: String,
    #[serde(flatten)]
    pub listing: ListingRequest,
}

/// Responds with a `Listing`: one sorted page plus breadcrumb and pagination
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<ListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state.drive().list(&req.owner, &req.listing).await?;
    Ok((http::StatusCode::OK, Json(listing)))
}
