//! Generic entity handlers: list, count, aggregate, read, create, update, delete.
//! Entities are resolved by their URL path segment.

use crate::error::{AppError, QueryError};
use crate::extractors::JsonBody;
use crate::handlers::params::parse_descriptor;
use crate::query::{AggregateRequest, Record};
use crate::response::{strip_all, strip_sensitive, success_message};
use crate::schema::EntitySchema;
use crate::service::{parse_id, CrudService};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};

fn entity_for_path<'s>(state: &'s AppState, path: &str) -> Result<&'s EntitySchema, AppError> {
    state
        .engine
        .catalog()
        .entity_by_path(path)
        .ok_or_else(|| AppError::Query(QueryError::UnknownEntity(path.to_string())))
}

/// `{ "<key>": value }`, the shape of count and aggregate responses.
pub(crate) fn scalar_body(key: &str, value: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert(key.to_string(), value);
    Json(Value::Object(body))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Record>>, AppError> {
    let entity = entity_for_path(&state, &path)?;
    let descriptor = parse_descriptor(entity, &params)?;
    let rows = state.engine.find(&entity.name, &descriptor, state.store.as_ref()).await?;
    Ok(Json(strip_all(state.engine.catalog(), entity, rows)))
}

pub async fn count(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let entity = entity_for_path(&state, &path)?;
    let descriptor = parse_descriptor(entity, &params)?;
    let request = AggregateRequest::Count;
    let total = state
        .engine
        .aggregate(&entity.name, &request, &descriptor.filters, state.store.as_ref())
        .await?;
    Ok(scalar_body(request.response_key(), total.to_json()))
}

/// `GET /:path/:agg/:field` for sum, min, max, avg.
pub async fn aggregate(
    State(state): State<AppState>,
    Path((path, agg, field)): Path<(String, String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    let entity = entity_for_path(&state, &path)?;
    let request = AggregateRequest::from_name(&agg, field)
        .ok_or_else(|| AppError::BadRequest(format!("unknown aggregate '{}'", agg)))?;
    let descriptor = parse_descriptor(entity, &params)?;
    let value = state
        .engine
        .aggregate(&entity.name, &request, &descriptor.filters, state.store.as_ref())
        .await?;
    Ok(scalar_body(request.response_key(), value.to_json()))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path, id)): Path<(String, String)>,
) -> Result<Json<Record>, AppError> {
    let entity = entity_for_path(&state, &path)?;
    let id = parse_id(&id)?;
    let mut row = CrudService::read(state.store.as_ref(), entity, id).await?;
    strip_sensitive(state.engine.catalog(), entity, &mut row);
    Ok(Json(row))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for_path(&state, &path)?;
    CrudService::create(state.store.as_ref(), entity, body).await?;
    Ok((StatusCode::CREATED, Json(success_message())))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path, id)): Path<(String, String)>,
    JsonBody(body): JsonBody<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for_path(&state, &path)?;
    let id = parse_id(&id)?;
    CrudService::update(state.store.as_ref(), entity, id, body).await?;
    Ok(Json(success_message()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for_path(&state, &path)?;
    let id = parse_id(&id)?;
    CrudService::delete(state.store.as_ref(), entity, id).await?;
    Ok(Json(success_message()))
}
