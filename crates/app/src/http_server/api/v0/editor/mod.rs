use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::ServiceState;

pub mod check;
pub mod open;
pub mod release;
pub mod save;
pub mod takeover;

/// An editor tab working on one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSession {
    pub owner: String,
    /// Per-tab client id
    pub client: String,
    pub node_id: String,
}

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/open", post(open::handler))
        .route("/save", post(save::handler))
        .route("/check", post(check::handler))
        .route("/takeover", post(takeover::handler))
        .route("/release", post(release::handler))
        .with_state(state)
}
