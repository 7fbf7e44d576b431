//! Generic CRUD over an entity store.

use crate::error::QueryError;
use crate::query::Record;
use crate::schema::EntitySchema;
use crate::service::RequestValidator;
use crate::store::EntityStore;
use serde_json::Value;

pub struct CrudService;

/// Parse a primary key path parameter. Non-numeric ids fail before reaching the store.
pub fn parse_id(id_str: &str) -> Result<i64, QueryError> {
    id_str
        .trim()
        .parse::<i64>()
        .map_err(|_| QueryError::Validation(format!("invalid id '{}': expected an integer", id_str)))
}

fn body_to_record(value: Value) -> Result<Record, QueryError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(QueryError::Validation("body must be a JSON object".into())),
    }
}

impl CrudService {
    /// Validate and insert one record. Returns the stored record including its id.
    pub async fn create(store: &dyn EntityStore, entity: &EntitySchema, body: Value) -> Result<Record, QueryError> {
        let body = body_to_record(body)?;
        RequestValidator::validate(entity, &body)?;
        let row = store.insert(entity, body).await?;
        tracing::debug!(entity = %entity.name, id = ?row.get(&entity.primary_key), "created");
        Ok(row)
    }

    pub async fn read(store: &dyn EntityStore, entity: &EntitySchema, id: i64) -> Result<Record, QueryError> {
        store
            .fetch(entity, id)
            .await?
            .ok_or_else(|| QueryError::NotFound(format!("{} {}", entity.name, id)))
    }

    /// Apply a partial update; only fields in the body change.
    pub async fn update(
        store: &dyn EntityStore,
        entity: &EntitySchema,
        id: i64,
        body: Value,
    ) -> Result<Record, QueryError> {
        let body = body_to_record(body)?;
        RequestValidator::validate_partial(entity, &body)?;
        store
            .update(entity, id, body)
            .await?
            .ok_or_else(|| QueryError::NotFound(format!("{} {}", entity.name, id)))
    }

    pub async fn delete(store: &dyn EntityStore, entity: &EntitySchema, id: i64) -> Result<(), QueryError> {
        if store.delete(entity, id).await? {
            tracing::debug!(entity = %entity.name, id, "deleted");
            Ok(())
        } else {
            Err(QueryError::NotFound(format!("{} {}", entity.name, id)))
        }
    }
}
