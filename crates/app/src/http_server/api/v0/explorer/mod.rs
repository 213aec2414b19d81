use axum::routing::post;
use axum::Router;

use crate::ServiceState;

pub mod chown;
pub mod create;
pub mod delete;
pub mod list;
pub mod mv;
pub mod rename;
pub mod search;
pub mod tags;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/list", post(list::handler))
        .route("/create", post(create::handler))
        .route("/delete", post(delete::handler))
        .route("/rename", post(rename::handler))
        .route("/move", post(mv::handler))
        .route("/tags", post(tags::handler))
        .route("/chown", post(chown::handler))
        .route("/search", post(search::handler))
        .with_state(state)
}
