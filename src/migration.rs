//! Apply the catalog to the database: one table per entity, then foreign keys for to_one relations.

use crate::error::StoreError;
use crate::schema::{Catalog, EntitySchema, IncludeDirection};
use crate::sql::quoted;
use serde_json::Value;
use sqlx::PgPool;

fn default_literal(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string().to_uppercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// CREATE TABLE IF NOT EXISTS with identity primary key, NOT NULL, UNIQUE and DEFAULT clauses.
pub fn create_table_sql(entity: &EntitySchema) -> String {
    let mut col_defs: Vec<String> = Vec::new();
    for f in &entity.fields {
        let mut def = format!("{} {}", quoted(&f.name), f.field_type.pg_type());
        if f.primary_key {
            def.push_str(" GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY");
            col_defs.push(def);
            continue;
        }
        if !f.nullable {
            def.push_str(" NOT NULL");
        }
        if f.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(lit) = f.default.as_ref().and_then(default_literal) {
            def.push_str(" DEFAULT ");
            def.push_str(&lit);
        }
        col_defs.push(def);
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quoted(&entity.name), col_defs.join(", "))
}

/// One ALTER TABLE per to_one relation. Constraint names are derived, so a re-run hits duplicate_object.
pub fn foreign_key_sql(entity: &EntitySchema) -> Vec<String> {
    entity
        .relations
        .iter()
        .filter(|r| r.direction == IncludeDirection::ToOne)
        .map(|r| {
            format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                quoted(&entity.name),
                quoted(&format!("fk_{}_{}", entity.name, r.name)),
                quoted(&r.local_field),
                quoted(&r.target),
                quoted(&r.foreign_field)
            )
        })
        .collect()
}

/// SQLSTATE 42710: the constraint name is already taken.
fn is_duplicate_object(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("42710"))
}

/// Create every catalog table that does not exist yet, then add foreign keys.
pub async fn ensure_entity_tables(pool: &PgPool, catalog: &Catalog) -> Result<(), StoreError> {
    for entity in catalog.entities() {
        let ddl = create_table_sql(entity);
        tracing::debug!(sql = %ddl, "migration");
        sqlx::query(&ddl).execute(pool).await?;
    }
    for entity in catalog.entities() {
        for ddl in foreign_key_sql(entity) {
            tracing::debug!(sql = %ddl, "migration");
            match sqlx::query(&ddl).execute(pool).await {
                Ok(_) => {}
                Err(e) if is_duplicate_object(&e) => tracing::debug!(sql = %ddl, "foreign key already present"),
                Err(e) => return Err(e.into()),
            }
        }
    }
    tracing::info!(entities = catalog.entities().len(), "entity tables ready");
    Ok(())
}
