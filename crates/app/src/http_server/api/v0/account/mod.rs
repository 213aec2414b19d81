use axum::routing::post;
use axum::Router;

use crate::ServiceState;

pub mod delete;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/delete", post(delete::handler))
        .with_state(state)
}
