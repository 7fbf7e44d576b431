//! Router assembly.

mod common;
mod entity;
mod user;

pub use common::common_routes;
pub use entity::entity_routes;
pub use user::user_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Full application: common routes, user presets, generic entities under `/api/v1`.
pub fn app_router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(user_routes(state.clone()))
        .nest("/api/v1", entity_routes(state))
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}
