//! PostgreSQL entity store: plans compiled to parameterized SQL and run through sqlx.

use crate::error::StoreError;
use crate::query::{AggregateRequest, ExecutablePlan, Record, ScalarValue};
use crate::schema::{EntitySchema, FieldInfo, FieldType};
use crate::sql::{aggregate_plan, delete, insert, select_by_id, select_plan, update, PgBindValue, QueryBuf};
use crate::store::EntityStore;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query.fetch_all(&self.pool).await.map_err(map_db_error)
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query.fetch_optional(&self.pool).await.map_err(map_db_error)
    }
}

/// Constraint violations (unique, foreign key, not-null, check) become `StoreError::Constraint`.
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.code().as_deref(), Some("23505" | "23503" | "23502" | "23514")) {
            return StoreError::Constraint(db.message().to_string());
        }
    }
    StoreError::Db(e)
}

fn decode_field(row: &PgRow, field: &FieldInfo) -> Result<Value, StoreError> {
    let name = field.name.as_str();
    let decode_err = |e: sqlx::Error| StoreError::Decode(format!("{}: {}", name, e));
    Ok(match field.field_type {
        FieldType::Integer => row
            .try_get::<Option<i64>, _>(name)
            .map_err(decode_err)?
            .map(|n| Value::Number(n.into())),
        FieldType::Float => row
            .try_get::<Option<f64>, _>(name)
            .map_err(decode_err)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        FieldType::Text => row.try_get::<Option<String>, _>(name).map_err(decode_err)?.map(Value::String),
        FieldType::Boolean => row.try_get::<Option<bool>, _>(name).map_err(decode_err)?.map(Value::Bool),
    }
    .unwrap_or(Value::Null))
}

fn row_to_record<'f>(row: &PgRow, fields: impl IntoIterator<Item = &'f FieldInfo>) -> Result<Record, StoreError> {
    let mut map = Record::new();
    for f in fields {
        map.insert(f.name.clone(), decode_field(row, f)?);
    }
    Ok(map)
}

#[async_trait]
impl EntityStore for PgStore {
    async fn insert(&self, entity: &EntitySchema, values: Record) -> Result<Record, StoreError> {
        let q = insert(entity, &values);
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Db(sqlx::Error::RowNotFound))?;
        row_to_record(&row, &entity.fields)
    }

    async fn fetch(&self, entity: &EntitySchema, id: i64) -> Result<Option<Record>, StoreError> {
        let mut q = select_by_id(entity);
        q.params.push(Value::Number(id.into()));
        self.fetch_optional(&q)
            .await?
            .map(|row| row_to_record(&row, &entity.fields))
            .transpose()
    }

    async fn update(&self, entity: &EntitySchema, id: i64, changes: Record) -> Result<Option<Record>, StoreError> {
        let q = update(entity, id, &changes);
        self.fetch_optional(&q)
            .await?
            .map(|row| row_to_record(&row, &entity.fields))
            .transpose()
    }

    async fn delete(&self, entity: &EntitySchema, id: i64) -> Result<bool, StoreError> {
        let mut q = delete(entity);
        q.params.push(Value::Number(id.into()));
        Ok(self.fetch_optional(&q).await?.is_some())
    }

    async fn select(&self, plan: &ExecutablePlan<'_>) -> Result<Vec<Record>, StoreError> {
        let q = select_plan(plan);
        let rows = self.fetch_all(&q).await?;
        let fields = plan.selected_fields();
        let include = plan.include();
        rows.iter()
            .map(|row| {
                let mut record = row_to_record(row, fields.iter().copied())?;
                if let Some(inc) = include {
                    let name = inc.relation.name.as_str();
                    let related = row
                        .try_get::<Option<Value>, _>(name)
                        .map_err(|e| StoreError::Decode(format!("{}: {}", name, e)))?
                        .unwrap_or(Value::Null);
                    record.insert(inc.relation.name.clone(), related);
                }
                Ok(record)
            })
            .collect()
    }

    async fn aggregate(&self, plan: &ExecutablePlan<'_>, request: &AggregateRequest) -> Result<ScalarValue, StoreError> {
        let q = aggregate_plan(plan, request);
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Db(sqlx::Error::RowNotFound))?;
        let integral = match request {
            AggregateRequest::Count => true,
            AggregateRequest::Avg(_) => false,
            AggregateRequest::Sum(f) | AggregateRequest::Min(f) | AggregateRequest::Max(f) => plan
                .entity()
                .field(f)
                .is_some_and(|fi| fi.field_type == FieldType::Integer),
        };
        let decode_err = |e: sqlx::Error| StoreError::Decode(format!("aggregate: {}", e));
        let value = if integral {
            row.try_get::<Option<i64>, _>("value")
                .map_err(decode_err)?
                .map(ScalarValue::Integer)
        } else {
            row.try_get::<Option<f64>, _>("value")
                .map_err(decode_err)?
                .map(ScalarValue::Float)
        };
        Ok(value.unwrap_or(ScalarValue::Null))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "postgres"
    }
}
