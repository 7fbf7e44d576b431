//! Generic entity routes. The first segment is the entity's path; handlers resolve it against the catalog.
//! Second-position parameters share one name so `count`, ids and aggregate names live side by side.

use crate::handlers::entity::{aggregate, count, create, delete, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path", get(list).post(create))
        .route("/:path/count", get(count))
        .route("/:path/:key", get(read).patch(update).put(update).delete(delete))
        .route("/:path/:key/:field", get(aggregate))
        .with_state(state)
}
