//! Catalog validation: unique names, primary keys, relation references.

use crate::error::SchemaError;
use crate::schema::{CatalogConfig, FieldType, IncludeDirection};
use std::collections::{HashMap, HashSet};

pub fn validate(config: &CatalogConfig) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    for e in &config.entities {
        if !names.insert(e.name.as_str()) {
            return Err(SchemaError::Duplicate {
                kind: "entity",
                name: e.name.clone(),
            });
        }
        if !paths.insert(e.path.as_str()) {
            return Err(SchemaError::Duplicate {
                kind: "path",
                name: e.path.clone(),
            });
        }
        let mut field_names = HashSet::new();
        for f in &e.fields {
            if !field_names.insert(f.name.as_str()) {
                return Err(SchemaError::Duplicate {
                    kind: "field",
                    name: format!("{}.{}", e.name, f.name),
                });
            }
        }
        let pk_ok = e
            .fields
            .iter()
            .any(|f| f.name == e.primary_key && f.type_ == FieldType::Integer);
        if !pk_ok {
            return Err(SchemaError::InvalidPrimaryKey {
                entity: e.name.clone(),
                field: e.primary_key.clone(),
            });
        }
    }

    let fields_by_entity: HashMap<&str, HashSet<&str>> = config
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.fields.iter().map(|f| f.name.as_str()).collect()))
        .collect();

    for e in &config.entities {
        let mut rel_names = HashSet::new();
        for r in &e.relations {
            if !rel_names.insert(r.name.as_str()) || fields_by_entity[e.name.as_str()].contains(r.name.as_str()) {
                return Err(SchemaError::Duplicate {
                    kind: "relation",
                    name: format!("{}.{}", e.name, r.name),
                });
            }
            let Some(target_fields) = fields_by_entity.get(r.target.as_str()) else {
                return Err(SchemaError::MissingReference {
                    kind: "entity",
                    id: r.target.clone(),
                });
            };
            if !fields_by_entity[e.name.as_str()].contains(r.local_field.as_str()) {
                return Err(SchemaError::MissingReference {
                    kind: "field",
                    id: format!("{}.{}", e.name, r.local_field),
                });
            }
            if !target_fields.contains(r.foreign_field.as_str()) {
                return Err(SchemaError::MissingReference {
                    kind: "field",
                    id: format!("{}.{}", r.target, r.foreign_field),
                });
            }
            if r.kind == IncludeDirection::ToOne && r.local_field == e.primary_key {
                return Err(SchemaError::MissingReference {
                    kind: "foreign key",
                    id: format!("{}.{}", e.name, r.name),
                });
            }
        }
    }

    Ok(())
}
