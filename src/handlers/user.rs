//! Named user endpoints. Each preset is a fixed query descriptor or aggregate over `user`.

use crate::error::{AppError, QueryError};
use crate::extractors::JsonBody;
use crate::handlers::entity::scalar_body;
use crate::query::{AggregateRequest, FilterPredicate, QueryDescriptor, SortSpec};
use crate::response::{strip_all, success_message};
use crate::service::{parse_id, CrudService};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

pub const USER_ENTITY: &str = "user";

#[derive(Clone, Debug, PartialEq)]
pub enum UserPreset {
    Rows(QueryDescriptor),
    Scalar(AggregateRequest),
}

impl UserPreset {
    pub fn by_name(name: &str) -> Option<Self> {
        let rows = QueryDescriptor::new();
        let credit = || "credit".to_string();
        Some(match name {
            "list" => UserPreset::Rows(rows),
            "findSomeField" => UserPreset::Rows(rows.select(["id", "credit", "level"])),
            "sort" => UserPreset::Rows(rows.sort(SortSpec::descending("credit"))),
            "filter" => UserPreset::Rows(rows.filter(FilterPredicate::equals("level", "user"))),
            "moreThan" => UserPreset::Rows(rows.filter(FilterPredicate::gte("credit", 300))),
            "lessThan" => UserPreset::Rows(rows.filter(FilterPredicate::lt("credit", 300))),
            "notEqual" => UserPreset::Rows(rows.filter(FilterPredicate::not_equals("credit", 300))),
            "in" => UserPreset::Rows(rows.filter(FilterPredicate::in_set("credit", [100, 200, 300]))),
            "isNull" => UserPreset::Rows(rows.filter(FilterPredicate::is_null("credit"))),
            "isNotNull" => UserPreset::Rows(rows.filter(FilterPredicate::is_not_null("credit"))),
            "between" => UserPreset::Rows(rows.filter(FilterPredicate::range("credit", 100, 300))),
            "usersAndDepartment" => UserPreset::Rows(rows.include("department")),
            "count" => UserPreset::Scalar(AggregateRequest::Count),
            "sum" => UserPreset::Scalar(AggregateRequest::Sum(credit())),
            "max" => UserPreset::Scalar(AggregateRequest::Max(credit())),
            "min" => UserPreset::Scalar(AggregateRequest::Min(credit())),
            "avg" => UserPreset::Scalar(AggregateRequest::Avg(credit())),
            _ => return None,
        })
    }
}

/// `GET /users/:preset`.
pub async fn preset(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, AppError> {
    let preset = UserPreset::by_name(&name).ok_or_else(|| QueryError::NotFound(format!("users/{}", name)))?;
    let entity = state.engine.entity(USER_ENTITY)?;
    let store = state.store.as_ref();
    match preset {
        UserPreset::Rows(descriptor) => {
            let rows = state.engine.find(USER_ENTITY, &descriptor, store).await?;
            Ok(Json(strip_all(state.engine.catalog(), entity, rows)).into_response())
        }
        UserPreset::Scalar(request) => {
            let value = state.engine.aggregate(USER_ENTITY, &request, &[], store).await?;
            Ok(scalar_body(request.response_key(), value.to_json()).into_response())
        }
    }
}

pub async fn create(State(state): State<AppState>, JsonBody(body): JsonBody<Value>) -> Result<impl IntoResponse, AppError> {
    let entity = state.engine.entity(USER_ENTITY)?;
    CrudService::create(state.store.as_ref(), entity, body).await?;
    Ok((StatusCode::CREATED, Json(success_message())))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.engine.entity(USER_ENTITY)?;
    let id = parse_id(&id)?;
    CrudService::update(state.store.as_ref(), entity, id, body).await?;
    Ok(Json(success_message()))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let entity = state.engine.entity(USER_ENTITY)?;
    let id = parse_id(&id)?;
    CrudService::delete(state.store.as_ref(), entity, id).await?;
    Ok(Json(success_message()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_named_preset_resolves() {
        for name in [
            "list", "findSomeField", "sort", "filter", "moreThan", "lessThan", "notEqual", "in", "isNull",
            "isNotNull", "between", "count", "sum", "max", "min", "avg", "usersAndDepartment",
        ] {
            assert!(UserPreset::by_name(name).is_some(), "{}", name);
        }
        assert!(UserPreset::by_name("drop").is_none());
    }

    #[test]
    fn test_between_preset_is_inclusive_range() {
        let UserPreset::Rows(d) = UserPreset::by_name("between").unwrap() else {
            panic!("expected rows preset");
        };
        assert_eq!(d.filters, vec![FilterPredicate::range("credit", 100, 300)]);
    }
}
