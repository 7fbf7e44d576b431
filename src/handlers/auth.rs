//! Sign-in and token inspection.

use crate::error::AppError;
use crate::extractors::{BearerToken, JsonBody};
use crate::handlers::user::USER_ENTITY;
use crate::query::{FilterPredicate, QueryDescriptor};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

/// `POST /users/signIn`: `{ user, token }` on match, 401 `{ message: "User not found" }` otherwise.
pub async fn sign_in(State(state): State<AppState>, JsonBody(body): JsonBody<SignInBody>) -> Result<Response, AppError> {
    let descriptor = QueryDescriptor::new()
        .filter(FilterPredicate::equals("email", body.email))
        .filter(FilterPredicate::equals("password", body.password))
        .select(["id", "email", "level"])
        .limit(1);
    let mut rows = state.engine.find(USER_ENTITY, &descriptor, state.store.as_ref()).await?;
    let Some(user) = rows.pop() else {
        tracing::debug!("sign-in rejected");
        return Ok((StatusCode::UNAUTHORIZED, Json(json!({"message": "User not found"}))).into_response());
    };
    let user = Value::Object(user);
    let token = state.signer.sign(&user)?;
    Ok(Json(json!({"user": user, "token": token})).into_response())
}

/// `GET /users/info`: verified claims of the presented token.
pub async fn info(State(state): State<AppState>, BearerToken(token): BearerToken) -> Result<Json<Value>, AppError> {
    let payload = state.signer.verify(&token)?;
    Ok(Json(json!({"payload": payload})))
}
