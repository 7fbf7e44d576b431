//! Declarative query description: predicates, sort, projection, inclusion, aggregates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Equals,
    NotEquals,
    Gte,
    Lte,
    Lt,
    Gt,
    InSet,
    IsNull,
    IsNotNull,
    Range,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not-equals",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Lt => "lt",
            Operator::Gt => "gt",
            Operator::InSet => "in-set",
            Operator::IsNull => "is-null",
            Operator::IsNotNull => "is-not-null",
            Operator::Range => "range",
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Gte | Operator::Lte | Operator::Lt | Operator::Gt | Operator::Range
        )
    }
}

/// One condition on one field. Arity is checked when the plan is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub op: Operator,
    #[serde(default)]
    pub operands: Vec<Value>,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, op: Operator, operands: Vec<Value>) -> Self {
        FilterPredicate {
            field: field.into(),
            op,
            operands,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, vec![value.into()])
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::NotEquals, vec![value.into()])
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gte, vec![value.into()])
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lte, vec![value.into()])
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gt, vec![value.into()])
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lt, vec![value.into()])
    }

    pub fn in_set<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(field, Operator::InSet, values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, Vec::new())
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, Vec::new())
    }

    pub fn range(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::new(field, Operator::Range, vec![low.into(), high.into()])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        SortSpec {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        SortSpec {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fn", content = "field", rename_all = "lowercase")]
pub enum AggregateRequest {
    Count,
    Sum(String),
    Min(String),
    Max(String),
    Avg(String),
}

impl AggregateRequest {
    /// Key used in the JSON response (`totalRows` for count).
    pub fn response_key(&self) -> &'static str {
        match self {
            AggregateRequest::Count => "totalRows",
            AggregateRequest::Sum(_) => "sum",
            AggregateRequest::Min(_) => "min",
            AggregateRequest::Max(_) => "max",
            AggregateRequest::Avg(_) => "avg",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            AggregateRequest::Count => None,
            AggregateRequest::Sum(f) | AggregateRequest::Min(f) | AggregateRequest::Max(f) | AggregateRequest::Avg(f) => {
                Some(f)
            }
        }
    }

    /// Parse `sum` / `min` / `max` / `avg` with a field name.
    pub fn from_name(name: &str, field: impl Into<String>) -> Option<Self> {
        let field = field.into();
        Some(match name {
            "sum" => AggregateRequest::Sum(field),
            "min" => AggregateRequest::Min(field),
            "max" => AggregateRequest::Max(field),
            "avg" => AggregateRequest::Avg(field),
            _ => return None,
        })
    }
}

/// Per-request query description. Filters are AND-combined.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(default)]
    pub filters: Vec<FilterPredicate>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
    #[serde(default)]
    pub projection: Option<Vec<String>>,
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: FilterPredicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.include = Some(relation.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}
