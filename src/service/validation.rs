//! Request body validation: field existence, value types, per-field rules.

use crate::error::QueryError;
use crate::query::Record;
use crate::schema::{EntitySchema, FieldInfo, FieldType, ValidationRule};
use regex::Regex;
use serde_json::Value;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body. Required and non-nullable fields without default must be present.
    pub fn validate(entity: &EntitySchema, body: &Record) -> Result<(), QueryError> {
        check_keys(entity, body)?;
        for f in entity.writable_fields() {
            let val = body.get(&f.name);
            let missing = val.is_none() || val == Some(&Value::Null);
            let required = f.rule.required == Some(true) || (!f.nullable && f.default.is_none());
            if required && missing {
                return Err(QueryError::Validation(format!("{} is required", f.name)));
            }
            if let Some(v) = val {
                validate_field(f, v)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PATCH/PUT). Required is not enforced for missing fields.
    pub fn validate_partial(entity: &EntitySchema, body: &Record) -> Result<(), QueryError> {
        if body.is_empty() {
            return Err(QueryError::Validation("update body has no fields".into()));
        }
        check_keys(entity, body)?;
        for (k, v) in body {
            if let Some(f) = entity.field(k) {
                validate_field(f, v)?;
            }
        }
        Ok(())
    }
}

fn check_keys(entity: &EntitySchema, body: &Record) -> Result<(), QueryError> {
    for k in body.keys() {
        match entity.field(k) {
            None => return Err(QueryError::unknown_field(&entity.name, k)),
            Some(f) if f.primary_key => {
                return Err(QueryError::Validation(format!("{} is assigned by the store", k)));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn type_matches(field_type: FieldType, v: &Value) -> bool {
    match field_type {
        FieldType::Text => v.is_string(),
        FieldType::Integer => v.is_i64(),
        FieldType::Float => v.is_number(),
        FieldType::Boolean => v.is_boolean(),
    }
}

fn validate_field(f: &FieldInfo, v: &Value) -> Result<(), QueryError> {
    let col = f.name.as_str();
    if v.is_null() {
        if !f.nullable {
            return Err(QueryError::Validation(format!("{} must not be null", col)));
        }
        return Ok(());
    }
    if !type_matches(f.field_type, v) {
        return Err(QueryError::Validation(format!("{} must be of type {}", col, f.field_type.name())));
    }
    validate_rule(col, v, &f.rule)
}

fn validate_rule(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), QueryError> {
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(QueryError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(QueryError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| QueryError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(QueryError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(QueryError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(QueryError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(QueryError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), QueryError> {
    if format.eq_ignore_ascii_case("email") {
        if let Some(s) = v.as_str() {
            let at = s.find('@');
            if s.len() < 3 || at.is_none() || at == Some(0) || at == Some(s.len() - 1) {
                return Err(QueryError::Validation(format!("{} must be a valid email", col)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin_catalog;
    use serde_json::json;

    fn body(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_requires_non_nullable_fields() {
        let catalog = builtin_catalog().unwrap();
        let user = catalog.entity("user").unwrap();
        let err = RequestValidator::validate(user, &body(json!({"email": "a@x.io"}))).unwrap_err();
        assert!(matches!(err, QueryError::Validation(m) if m.contains("password")));
        assert!(RequestValidator::validate(user, &body(json!({"email": "a@x.io", "password": "pw"}))).is_ok());
    }

    #[test]
    fn test_unknown_and_primary_key_fields_rejected() {
        let catalog = builtin_catalog().unwrap();
        let customer = catalog.entity("customer").unwrap();
        let err = RequestValidator::validate(customer, &body(json!({"name": "J", "nickname": "x"}))).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { .. }));
        let err = RequestValidator::validate_partial(customer, &body(json!({"id": 4}))).unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
    }

    #[test]
    fn test_types_and_rules() {
        let catalog = builtin_catalog().unwrap();
        let user = catalog.entity("user").unwrap();
        let bad_type = body(json!({"credit": "lots"}));
        assert!(RequestValidator::validate_partial(user, &bad_type).is_err());
        let bad_email = body(json!({"email": "nobody"}));
        assert!(RequestValidator::validate_partial(user, &bad_email).is_err());
        let bad_level = body(json!({"level": "root"}));
        assert!(RequestValidator::validate_partial(user, &bad_level).is_err());
        let null_credit = body(json!({"credit": null}));
        assert!(RequestValidator::validate_partial(user, &null_credit).is_ok());
        let null_email = body(json!({"email": null}));
        assert!(RequestValidator::validate_partial(user, &null_email).is_err());
        assert!(RequestValidator::validate_partial(user, &Record::new()).is_err());
    }
}
