//! Named user endpoints and sign-in.

use crate::handlers::{auth, user};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn user_routes(state: AppState) -> Router {
    Router::new()
        .route("/users/create", post(user::create))
        .route("/users/update/:id", put(user::update))
        .route("/users/remove/:id", delete(user::remove))
        .route("/users/signIn", post(auth::sign_in))
        .route("/users/info", get(auth::info))
        .route("/users/:preset", get(user::preset))
        .with_state(state)
}
