//! In-memory entity store. Rows are kept in primary key order per entity.

use crate::error::StoreError;
use crate::query::eval::{aggregate_records, compare_values, sort_cmp};
use crate::query::{AggregateRequest, ExecutablePlan, Record, ScalarValue};
use crate::schema::{Catalog, EntitySchema, FieldType, IncludeDirection};
use crate::store::EntityStore;
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Record>,
}

type Tables = HashMap<String, Table>;

/// Store backed by process memory. Enforces not-null, unique and to_one foreign key constraints.
pub struct InMemoryStore {
    catalog: Arc<Catalog>,
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let tables = catalog
            .entities()
            .iter()
            .map(|e| (e.name.clone(), Table { next_id: 1, rows: BTreeMap::new() }))
            .collect();
        InMemoryStore {
            catalog,
            tables: RwLock::new(tables),
        }
    }
}

fn table<'t>(tables: &'t Tables, entity: &str) -> Result<&'t Table, StoreError> {
    tables.get(entity).ok_or_else(|| StoreError::MissingTable(entity.to_string()))
}

fn same(a: &Value, b: &Value) -> bool {
    !a.is_null() && compare_values(a, b) == Some(Ordering::Equal)
}

/// Store float fields as floats, so `2` reads back as `2.0` the way a DOUBLE PRECISION column does.
fn normalize_floats(entity: &EntitySchema, row: &mut Record) {
    for f in entity.fields.iter().filter(|f| f.field_type == FieldType::Float) {
        if let Some(v) = row.get_mut(&f.name) {
            if let Some(n) = v.as_f64().and_then(Number::from_f64) {
                *v = Value::Number(n);
            }
        }
    }
}

/// Check not-null, unique and foreign key constraints for `row` about to be stored under `id`.
fn check_constraints(
    catalog: &Catalog,
    tables: &Tables,
    entity: &EntitySchema,
    id: i64,
    row: &Record,
) -> Result<(), StoreError> {
    let own = table(tables, &entity.name)?;
    for f in entity.fields.iter().filter(|f| !f.primary_key) {
        let value = row.get(&f.name).unwrap_or(&Value::Null);
        if value.is_null() {
            if !f.nullable {
                return Err(StoreError::Constraint(format!(
                    "null value in field '{}' of '{}' violates not-null constraint",
                    f.name, entity.name
                )));
            }
            continue;
        }
        if f.unique {
            let taken = own
                .rows
                .iter()
                .any(|(other_id, other)| *other_id != id && other.get(&f.name).is_some_and(|v| same(v, value)));
            if taken {
                return Err(StoreError::Constraint(format!(
                    "duplicate value {} for unique field '{}' of '{}'",
                    value, f.name, entity.name
                )));
            }
        }
    }

    for rel in entity.relations.iter().filter(|r| r.direction == IncludeDirection::ToOne) {
        let Some(value) = row.get(&rel.local_field).filter(|v| !v.is_null()) else {
            continue;
        };
        let target = catalog
            .entity(&rel.target)
            .ok_or_else(|| StoreError::MissingTable(rel.target.clone()))?;
        let exists = table(tables, &target.name)?
            .rows
            .values()
            .any(|r| r.get(&rel.foreign_field).is_some_and(|v| same(v, value)));
        if !exists {
            return Err(StoreError::Constraint(format!(
                "'{}' = {} references a missing {}",
                rel.local_field, value, target.name
            )));
        }
    }
    Ok(())
}

/// Reject deleting a row that other rows still reference through a to_one relation.
fn check_not_referenced(catalog: &Catalog, tables: &Tables, entity: &EntitySchema, row: &Record) -> Result<(), StoreError> {
    for other in catalog.entities() {
        for rel in other
            .relations
            .iter()
            .filter(|r| r.direction == IncludeDirection::ToOne && r.target == entity.name)
        {
            let Some(key) = row.get(&rel.foreign_field).filter(|v| !v.is_null()) else {
                continue;
            };
            let referenced = table(tables, &other.name)?
                .rows
                .values()
                .any(|r| r.get(&rel.local_field).is_some_and(|v| same(v, key)));
            if referenced {
                return Err(StoreError::Constraint(format!(
                    "{} is still referenced from {}.{}",
                    entity.name, other.name, rel.local_field
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn insert(&self, entity: &EntitySchema, mut values: Record) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().await;
        values.remove(&entity.primary_key);
        for f in entity.writable_fields() {
            if !values.contains_key(&f.name) {
                values.insert(f.name.clone(), f.default.clone().unwrap_or(Value::Null));
            }
        }
        values.retain(|k, _| entity.field(k).is_some());
        normalize_floats(entity, &mut values);

        let id = table(&tables, &entity.name)?.next_id;
        check_constraints(&self.catalog, &tables, entity, id, &values)?;

        let mut row = Record::new();
        for f in &entity.fields {
            let v = if f.primary_key {
                Value::Number(id.into())
            } else {
                values.remove(&f.name).unwrap_or(Value::Null)
            };
            row.insert(f.name.clone(), v);
        }
        let t = tables
            .get_mut(&entity.name)
            .ok_or_else(|| StoreError::MissingTable(entity.name.clone()))?;
        t.next_id += 1;
        t.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn fetch(&self, entity: &EntitySchema, id: i64) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(table(&tables, &entity.name)?.rows.get(&id).cloned())
    }

    async fn update(&self, entity: &EntitySchema, id: i64, changes: Record) -> Result<Option<Record>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(mut row) = table(&tables, &entity.name)?.rows.get(&id).cloned() else {
            return Ok(None);
        };
        for (k, v) in changes {
            if k != entity.primary_key && entity.field(&k).is_some() {
                row.insert(k, v);
            }
        }
        normalize_floats(entity, &mut row);
        check_constraints(&self.catalog, &tables, entity, id, &row)?;
        if let Some(t) = tables.get_mut(&entity.name) {
            t.rows.insert(id, row.clone());
        }
        Ok(Some(row))
    }

    async fn delete(&self, entity: &EntitySchema, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(row) = table(&tables, &entity.name)?.rows.get(&id) else {
            return Ok(false);
        };
        check_not_referenced(&self.catalog, &tables, entity, row)?;
        Ok(tables
            .get_mut(&entity.name)
            .map(|t| t.rows.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn select(&self, plan: &ExecutablePlan<'_>) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        let rows = &table(&tables, &plan.entity().name)?.rows;

        let mut out: Vec<Record> = rows
            .values()
            .filter(|r| plan.predicates().iter().all(|p| p.matches(r)))
            .cloned()
            .collect();

        if let Some(sort) = plan.sort() {
            // stable: rows already in primary key order break ties
            out.sort_by(|a, b| sort_cmp(a.get(&sort.field), b.get(&sort.field), sort.direction));
        }

        let offset = plan.offset().unwrap_or(0) as usize;
        let limit = plan.limit().map(|n| n as usize).unwrap_or(usize::MAX);
        let mut out: Vec<Record> = out.into_iter().skip(offset).take(limit).collect();

        if let Some(include) = plan.include() {
            let related = &table(&tables, &include.target.name)?.rows;
            let rel = include.relation;
            for row in &mut out {
                let key = row.get(&rel.local_field).cloned().unwrap_or(Value::Null);
                let mut matches = related
                    .values()
                    .filter(|r| r.get(&rel.foreign_field).is_some_and(|v| same(v, &key)))
                    .cloned()
                    .map(Value::Object);
                let annotation = match rel.direction {
                    IncludeDirection::ToOne => matches.next().unwrap_or(Value::Null),
                    IncludeDirection::ToMany => Value::Array(matches.collect()),
                };
                row.insert(rel.name.clone(), annotation);
            }
        }

        Ok(out)
    }

    async fn aggregate(&self, plan: &ExecutablePlan<'_>, request: &AggregateRequest) -> Result<ScalarValue, StoreError> {
        let tables = self.tables.read().await;
        let rows = &table(&tables, &plan.entity().name)?.rows;
        let matching = rows.values().filter(|r| plan.predicates().iter().all(|p| p.matches(r)));
        let field_type = request
            .field()
            .and_then(|f| plan.entity().field(f))
            .map(|f| f.field_type);
        Ok(aggregate_records(matching, request, field_type))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::build_aggregate;
    use crate::schema::{builtin_catalog, load_from_str};
    use serde_json::json;

    fn store() -> (Arc<Catalog>, InMemoryStore) {
        let catalog = Arc::new(builtin_catalog().unwrap());
        let store = InMemoryStore::new(catalog.clone());
        (catalog, store)
    }

    fn obj(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_defaults() {
        let (catalog, store) = store();
        let user = catalog.entity("user").unwrap();
        let a = store.insert(user, obj(json!({"email": "a@x.io", "password": "p"}))).await.unwrap();
        let b = store.insert(user, obj(json!({"email": "b@x.io", "password": "p"}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert_eq!(a["level"], json!("user"));
        assert_eq!(a["credit"], Value::Null);
    }

    #[tokio::test]
    async fn test_unique_violation_is_constraint_error() {
        let (catalog, store) = store();
        let user = catalog.entity("user").unwrap();
        store.insert(user, obj(json!({"email": "a@x.io", "password": "p"}))).await.unwrap();
        let err = store
            .insert(user, obj(json!({"email": "a@x.io", "password": "q"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_missing_foreign_key_target_is_rejected() {
        let (catalog, store) = store();
        let user = catalog.entity("user").unwrap();
        let err = store
            .insert(user, obj(json!({"email": "a@x.io", "password": "p", "departmentId": 7})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_referenced_row_cannot_be_deleted() {
        let (catalog, store) = store();
        let dept = catalog.entity("department").unwrap();
        let user = catalog.entity("user").unwrap();
        store.insert(dept, obj(json!({"name": "Sales"}))).await.unwrap();
        store
            .insert(user, obj(json!({"email": "a@x.io", "password": "p", "departmentId": 1})))
            .await
            .unwrap();
        assert!(matches!(store.delete(dept, 1).await, Err(StoreError::Constraint(_))));
        assert!(store.delete(user, 1).await.unwrap());
        assert!(store.delete(dept, 1).await.unwrap());
        assert!(!store.delete(dept, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_keeps_untouched_fields() {
        let (catalog, store) = store();
        let customer = catalog.entity("customer").unwrap();
        store.insert(customer, obj(json!({"name": "John", "age": 20}))).await.unwrap();
        let updated = store.update(customer, 1, obj(json!({"age": 21}))).await.unwrap().unwrap();
        assert_eq!(updated["name"], json!("John"));
        assert_eq!(updated["age"], json!(21));
        assert!(store.update(customer, 9, obj(json!({"age": 1}))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_float_field_reads_and_aggregates_as_float() {
        let catalog = Arc::new(
            load_from_str(
                r#"{"entities": [{"name": "product", "path": "products", "fields": [
                    {"name": "id", "type": "integer"},
                    {"name": "price", "type": "float"}
                ]}]}"#,
            )
            .unwrap(),
        );
        let store = InMemoryStore::new(catalog.clone());
        let product = catalog.entity("product").unwrap();
        let first = store.insert(product, obj(json!({"price": 1}))).await.unwrap();
        store.insert(product, obj(json!({"price": 2}))).await.unwrap();
        assert_eq!(first["price"], json!(1.0));
        assert!(first["price"].as_i64().is_none());

        let sum = AggregateRequest::Sum("price".into());
        let plan = build_aggregate(product, &sum, &[]).unwrap();
        assert_eq!(store.aggregate(&plan, &sum).await.unwrap(), ScalarValue::Float(3.0));
        let max = AggregateRequest::Max("price".into());
        let plan = build_aggregate(product, &max, &[]).unwrap();
        assert_eq!(store.aggregate(&plan, &max).await.unwrap(), ScalarValue::Float(2.0));

        let updated = store.update(product, 1, obj(json!({"price": 5}))).await.unwrap().unwrap();
        assert_eq!(updated["price"], json!(5.0));
    }
}
