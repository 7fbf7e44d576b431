//! Query-string → `QueryDescriptor`.
//!
//! `field=v` and `field[eq]=v` filter by equality, `field[ne|gt|gte|lt|lte]=v`
//! compare, `field[in]=a,b` and `field[between]=lo,hi` take lists,
//! `field[null]=true|false` tests for null. `sort`, `fields`, `include`,
//! `limit` and `offset` are reserved. Values are typed by the field's schema;
//! unknown fields pass through so the engine reports them.

use crate::error::AppError;
use crate::query::{FilterPredicate, Operator, QueryDescriptor, SortSpec};
use crate::schema::{EntitySchema, FieldType};
use serde_json::{Number, Value};

fn split_key(key: &str) -> Result<(&str, Option<&str>), AppError> {
    match key.find('[') {
        None => Ok((key, None)),
        Some(i) => {
            let op = key[i + 1..]
                .strip_suffix(']')
                .ok_or_else(|| AppError::BadRequest(format!("malformed filter key '{}'", key)))?;
            Ok((&key[..i], Some(op)))
        }
    }
}

/// Type a single raw value for `field`. Values that do not parse stay strings
/// and fail operand validation in the engine.
fn typed_value(entity: &EntitySchema, field: &str, raw: &str) -> Value {
    let Some(info) = entity.field(field) else {
        return Value::String(raw.to_string());
    };
    match info.field_type {
        FieldType::Integer => raw.trim().parse::<i64>().map(Value::from).ok(),
        FieldType::Float => raw.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
        FieldType::Boolean => match raw.trim() {
            r if r.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            r if r.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            _ => None,
        },
        FieldType::Text => None,
    }
    .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn typed_or_null(entity: &EntitySchema, field: &str, raw: &str) -> Value {
    if raw == "null" {
        Value::Null
    } else {
        typed_value(entity, field, raw)
    }
}

fn typed_list(entity: &EntitySchema, field: &str, raw: &str) -> Vec<Value> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| typed_value(entity, field, s))
        .collect()
}

fn parse_u32(key: &str, raw: &str) -> Result<u32, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key)))
}

fn predicate(entity: &EntitySchema, field: &str, op: Option<&str>, raw: &str) -> Result<FilterPredicate, AppError> {
    let single = |op: Operator| FilterPredicate::new(field, op, vec![typed_or_null(entity, field, raw)]);
    Ok(match op {
        None | Some("eq") => single(Operator::Equals),
        Some("ne") => single(Operator::NotEquals),
        Some("gt") => single(Operator::Gt),
        Some("gte") => single(Operator::Gte),
        Some("lt") => single(Operator::Lt),
        Some("lte") => single(Operator::Lte),
        Some("in") => FilterPredicate::new(field, Operator::InSet, typed_list(entity, field, raw)),
        Some("between") => FilterPredicate::new(field, Operator::Range, typed_list(entity, field, raw)),
        Some("null") => match raw.trim() {
            "true" => FilterPredicate::is_null(field),
            "false" => FilterPredicate::is_not_null(field),
            other => return Err(AppError::BadRequest(format!("{}[null] expects true or false, got '{}'", field, other))),
        },
        Some(other) => return Err(AppError::BadRequest(format!("unknown filter operator '{}'", other))),
    })
}

pub fn parse_descriptor(entity: &EntitySchema, params: &[(String, String)]) -> Result<QueryDescriptor, AppError> {
    let mut descriptor = QueryDescriptor::new();
    for (key, raw) in params {
        match key.as_str() {
            "sort" => {
                let sort = match raw.strip_prefix('-') {
                    Some(field) => SortSpec::descending(field),
                    None => SortSpec::ascending(raw.trim_start_matches('+')),
                };
                descriptor = descriptor.sort(sort);
            }
            "fields" => {
                descriptor = descriptor.select(raw.split(',').map(str::trim).filter(|s| !s.is_empty()));
            }
            "include" => descriptor = descriptor.include(raw.trim()),
            "limit" => descriptor = descriptor.limit(parse_u32(key, raw)?),
            "offset" => descriptor = descriptor.offset(parse_u32(key, raw)?),
            _ => {
                let (field, op) = split_key(key)?;
                descriptor = descriptor.filter(predicate(entity, field, op, raw)?);
            }
        }
    }
    Ok(descriptor)
}
