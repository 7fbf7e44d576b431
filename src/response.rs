//! Response helpers: mutation acknowledgement and sensitive-field stripping.

use crate::query::Record;
use crate::schema::{Catalog, EntitySchema};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct MessageBody {
    pub message: &'static str,
}

pub fn success_message() -> MessageBody {
    MessageBody { message: "success" }
}

/// Remove sensitive fields from a record, including records under included relations.
pub fn strip_sensitive(catalog: &Catalog, entity: &EntitySchema, record: &mut Record) {
    record.retain(|k, _| !entity.is_sensitive(k));
    for rel in &entity.relations {
        let Some(target) = catalog.entity(&rel.target) else {
            continue;
        };
        match record.get_mut(&rel.name) {
            Some(Value::Object(nested)) => nested.retain(|k, _| !target.is_sensitive(k)),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::Object(nested) = item {
                        nested.retain(|k, _| !target.is_sensitive(k));
                    }
                }
            }
            _ => {}
        }
    }
}

pub fn strip_all(catalog: &Catalog, entity: &EntitySchema, mut rows: Vec<Record>) -> Vec<Record> {
    for row in &mut rows {
        strip_sensitive(catalog, entity, row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin_catalog;
    use serde_json::json;

    #[test]
    fn test_password_removed_from_user_and_included_users() {
        let catalog = builtin_catalog().unwrap();
        let mut user = json!({"id": 1, "email": "a@x.io", "password": "pw", "department": null})
            .as_object()
            .cloned()
            .unwrap();
        strip_sensitive(&catalog, catalog.entity("user").unwrap(), &mut user);
        assert!(!user.contains_key("password"));
        assert!(user.contains_key("email"));

        let dept = json!({"id": 1, "name": "R&D", "users": [{"id": 1, "password": "pw"}]});
        let rows = strip_all(&catalog, catalog.entity("department").unwrap(), vec![dept.as_object().cloned().unwrap()]);
        assert_eq!(rows[0]["users"], json!([{"id": 1}]));
    }
}
