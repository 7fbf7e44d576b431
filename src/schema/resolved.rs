//! Resolved catalog: config validated and flattened for runtime lookup.

use crate::schema::{FieldType, IncludeDirection, ValidationRule};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub default: Option<Value>,
    pub sensitive: bool,
    pub rule: ValidationRule,
}

/// A relation usable with `include=<name>`.
#[derive(Clone, Debug)]
pub struct RelationInfo {
    pub name: String,
    pub direction: IncludeDirection,
    /// Name of the related entity.
    pub target: String,
    /// Our field used in the join (our FK for to_one; usually our PK for to_many).
    pub local_field: String,
    /// Their field used in the join (their PK for to_one; their FK for to_many).
    pub foreign_field: String,
}

#[derive(Clone, Debug)]
pub struct EntitySchema {
    pub name: String,
    pub path: String,
    pub primary_key: String,
    pub fields: Vec<FieldInfo>,
    pub relations: Vec<RelationInfo>,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationInfo> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Fields accepted in create/update bodies.
    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter().filter(|f| !f.primary_key)
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.field(name).map(|f| f.sensitive).unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entities: Vec<EntitySchema>,
    by_name: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
}

impl Catalog {
    pub(crate) fn new(entities: Vec<EntitySchema>) -> Self {
        let by_name = entities.iter().enumerate().map(|(i, e)| (e.name.clone(), i)).collect();
        let by_path = entities.iter().enumerate().map(|(i, e)| (e.path.clone(), i)).collect();
        Catalog {
            entities,
            by_name,
            by_path,
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }

    pub fn entity_by_path(&self, path: &str) -> Option<&EntitySchema> {
        self.by_path.get(path).map(|&i| &self.entities[i])
    }

    pub fn entities(&self) -> &[EntitySchema] {
        &self.entities
    }
}
