use axum::Router;

pub mod account;
pub mod editor;
mod error;
pub mod explorer;

pub use error::{status_for, ApiError};

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/account", account::router(state.clone()))
        .nest("/editor", editor::router(state.clone()))
        .nest("/explorer", explorer::router(state.clone()))
        .with_state(state)
}
