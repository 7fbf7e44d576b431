//! Load the entity catalog from JSON (file or the built-in default).

use crate::error::SchemaError;
use crate::schema::resolved::{Catalog, EntitySchema, FieldInfo, RelationInfo};
use crate::schema::{validate, CatalogConfig};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../../schema/catalog.json");

/// Build resolved catalog from raw config (validates first).
pub fn resolve(config: &CatalogConfig) -> Result<Catalog, SchemaError> {
    validate(config)?;

    let entities = config
        .entities
        .iter()
        .map(|e| EntitySchema {
            name: e.name.clone(),
            path: e.path.clone(),
            primary_key: e.primary_key.clone(),
            fields: e
                .fields
                .iter()
                .map(|f| {
                    let primary_key = f.name == e.primary_key;
                    FieldInfo {
                        name: f.name.clone(),
                        field_type: f.type_,
                        nullable: f.nullable && !primary_key,
                        unique: f.unique || primary_key,
                        primary_key,
                        default: f.default.clone(),
                        sensitive: f.sensitive,
                        rule: f.validation.clone(),
                    }
                })
                .collect(),
            relations: e
                .relations
                .iter()
                .map(|r| RelationInfo {
                    name: r.name.clone(),
                    direction: r.kind,
                    target: r.target.clone(),
                    local_field: r.local_field.clone(),
                    foreign_field: r.foreign_field.clone(),
                })
                .collect(),
        })
        .collect();

    Ok(Catalog::new(entities))
}

pub fn load_from_str(json: &str) -> Result<Catalog, SchemaError> {
    let config: CatalogConfig = serde_json::from_str(json).map_err(|e| SchemaError::Load(e.to_string()))?;
    resolve(&config)
}

pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Catalog, SchemaError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&json)
}

/// The users / departments / customers catalog shipped with the crate.
pub fn builtin_catalog() -> Result<Catalog, SchemaError> {
    load_from_str(BUILTIN_CATALOG)
}
