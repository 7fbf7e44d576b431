//! Query results: rows or a scalar aggregate.

use serde::Serialize;
use serde_json::{Map, Value};

/// One record as a JSON object keyed by field name.
pub type Record = Map<String, Value>;

/// Aggregate result. `Null` is returned by sum/min/max/avg over an empty set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Integer(i64),
    Float(f64),
    Null,
}

impl ScalarValue {
    pub fn to_json(self) -> Value {
        match self {
            ScalarValue::Integer(n) => Value::Number(n.into()),
            ScalarValue::Float(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            ScalarValue::Null => Value::Null,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<Record>),
    Scalar(ScalarValue),
}
