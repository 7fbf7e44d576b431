//! In-memory evaluation of compiled plans: predicate matching, ordering, aggregation.
//!
//! Semantics follow PostgreSQL so both stores agree: a comparison against a
//! null field value is false, nulls sort last ascending and first descending,
//! and aggregates other than count skip nulls.

use crate::query::plan::{CompiledPredicate, Condition};
use crate::query::{AggregateRequest, Record, ScalarValue, SortDirection};
use crate::schema::FieldType;
use serde_json::Value;
use std::cmp::Ordering;

/// Compare two non-null JSON scalars of the same kind.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Some(Ordering::Equal)
}

impl CompiledPredicate {
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.field).filter(|v| !v.is_null());
        let Some(v) = value else {
            return matches!(self.condition, Condition::IsNull);
        };
        let ord = |rhs: &Value| compare_values(v, rhs);
        match &self.condition {
            Condition::IsNull => false,
            Condition::IsNotNull => true,
            Condition::Eq(rhs) => equal(v, rhs),
            Condition::Ne(rhs) => ord(rhs).is_some_and(|o| o != Ordering::Equal),
            Condition::Gt(rhs) => ord(rhs) == Some(Ordering::Greater),
            Condition::Gte(rhs) => matches!(ord(rhs), Some(Ordering::Greater | Ordering::Equal)),
            Condition::Lt(rhs) => ord(rhs) == Some(Ordering::Less),
            Condition::Lte(rhs) => matches!(ord(rhs), Some(Ordering::Less | Ordering::Equal)),
            Condition::In(set) => set.iter().any(|rhs| equal(v, rhs)),
            Condition::Between(lo, hi) => {
                matches!(ord(lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(ord(hi), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

/// Order two field values for sorting. Null is greater than any value, so it
/// ends up last ascending and first descending.
pub fn sort_cmp(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ord = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    };
    match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    }
}

/// Compute an aggregate over already-filtered records. `field_type` is the type of the
/// aggregated field; sum/min/max are integers only for integer fields.
pub fn aggregate_records<'r>(
    records: impl Iterator<Item = &'r Record>,
    request: &AggregateRequest,
    field_type: Option<FieldType>,
) -> ScalarValue {
    let Some(field) = request.field() else {
        return ScalarValue::Integer(records.count() as i64);
    };
    let values: Vec<&Value> = records
        .filter_map(|r| r.get(field))
        .filter(|v| v.is_number())
        .collect();
    if values.is_empty() {
        return ScalarValue::Null;
    }
    let integral = field_type == Some(FieldType::Integer);

    match request {
        AggregateRequest::Count => ScalarValue::Integer(values.len() as i64),
        AggregateRequest::Sum(_) if integral => {
            let total: i128 = values.iter().filter_map(|v| v.as_i64()).map(i128::from).sum();
            i64::try_from(total)
                .map(ScalarValue::Integer)
                .unwrap_or(ScalarValue::Float(total as f64))
        }
        AggregateRequest::Sum(_) => ScalarValue::Float(values.iter().filter_map(|v| v.as_f64()).sum()),
        AggregateRequest::Avg(_) => {
            let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
            ScalarValue::Float(total / values.len() as f64)
        }
        AggregateRequest::Min(_) | AggregateRequest::Max(_) => {
            let want = if matches!(request, AggregateRequest::Min(_)) {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let best = values
                .iter()
                .copied()
                .reduce(|acc, v| if compare_values(v, acc) == Some(want) { v } else { acc });
            match best {
                Some(v) if integral => v.as_i64().map(ScalarValue::Integer).unwrap_or(ScalarValue::Null),
                Some(v) => v.as_f64().map(ScalarValue::Float).unwrap_or(ScalarValue::Null),
                None => ScalarValue::Null,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn pred(condition: Condition) -> CompiledPredicate {
        CompiledPredicate {
            field: "credit".into(),
            field_type: FieldType::Integer,
            condition,
        }
    }

    #[test]
    fn test_comparisons_against_null_are_false() {
        let r = record(json!({"id": 1, "credit": null}));
        assert!(!pred(Condition::Ne(json!(300))).matches(&r));
        assert!(!pred(Condition::Lt(json!(300))).matches(&r));
        assert!(pred(Condition::IsNull).matches(&r));
        assert!(!pred(Condition::IsNotNull).matches(&r));
    }

    #[test]
    fn test_between_is_inclusive() {
        let p = pred(Condition::Between(json!(100), json!(300)));
        assert!(p.matches(&record(json!({"credit": 100}))));
        assert!(p.matches(&record(json!({"credit": 300}))));
        assert!(!p.matches(&record(json!({"credit": 301}))));
    }

    #[test]
    fn test_sort_cmp_places_nulls_last_ascending() {
        let null = Value::Null;
        let one = json!(1);
        assert_eq!(sort_cmp(Some(&null), Some(&one), SortDirection::Ascending), Ordering::Greater);
        assert_eq!(sort_cmp(Some(&null), Some(&one), SortDirection::Descending), Ordering::Less);
        assert_eq!(sort_cmp(None, Some(&null), SortDirection::Ascending), Ordering::Equal);
    }

    #[test]
    fn test_aggregates_skip_nulls() {
        let rows = vec![
            record(json!({"credit": 100})),
            record(json!({"credit": null})),
            record(json!({"credit": 250})),
        ];
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Count, None), ScalarValue::Integer(3));
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Sum("credit".into()), Some(FieldType::Integer)), ScalarValue::Integer(350));
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Min("credit".into()), Some(FieldType::Integer)), ScalarValue::Integer(100));
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Max("credit".into()), Some(FieldType::Integer)), ScalarValue::Integer(250));
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Avg("credit".into()), Some(FieldType::Integer)), ScalarValue::Float(175.0));
    }

    #[test]
    fn test_all_null_aggregate_is_null() {
        let rows = vec![record(json!({"credit": null}))];
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Sum("credit".into()), Some(FieldType::Integer)), ScalarValue::Null);
    }

    #[test]
    fn test_float_field_aggregates_stay_float() {
        let rows = vec![record(json!({"price": 1})), record(json!({"price": 2}))];
        let float = Some(FieldType::Float);
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Sum("price".into()), float), ScalarValue::Float(3.0));
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Max("price".into()), float), ScalarValue::Float(2.0));
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Min("price".into()), float), ScalarValue::Float(1.0));
        assert_eq!(aggregate_records(rows.iter(), &AggregateRequest::Count, None), ScalarValue::Integer(2));
    }
}
