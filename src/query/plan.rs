//! Descriptor validation and compilation into an executable plan.

use crate::error::QueryError;
use crate::query::{AggregateRequest, FilterPredicate, Operator, QueryDescriptor, SortSpec};
use crate::schema::{Catalog, EntitySchema, FieldInfo, FieldType, RelationInfo};
use serde_json::{Number, Value};

/// Upper bound applied to every requested limit.
pub const MAX_LIMIT: u32 = 1000;

/// A predicate whose operands have been checked against the field type.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    IsNull,
    IsNotNull,
    /// Inclusive on both ends.
    Between(Value, Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledPredicate {
    pub field: String,
    pub field_type: FieldType,
    pub condition: Condition,
}

#[derive(Clone, Copy, Debug)]
pub struct IncludePlan<'a> {
    pub relation: &'a RelationInfo,
    pub target: &'a EntitySchema,
}

/// Validated, store-executable form of a [`QueryDescriptor`]. Immutable once built.
#[derive(Clone, Debug)]
pub struct ExecutablePlan<'a> {
    entity: &'a EntitySchema,
    predicates: Vec<CompiledPredicate>,
    sort: Option<SortSpec>,
    projection: Option<Vec<String>>,
    include: Option<IncludePlan<'a>>,
    limit: Option<u32>,
    offset: Option<u32>,
    aggregate: Option<AggregateRequest>,
}

impl<'a> ExecutablePlan<'a> {
    pub fn entity(&self) -> &'a EntitySchema {
        self.entity
    }

    pub fn predicates(&self) -> &[CompiledPredicate] {
        &self.predicates
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn projection(&self) -> Option<&[String]> {
        self.projection.as_deref()
    }

    pub fn include(&self) -> Option<IncludePlan<'a>> {
        self.include
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    pub fn aggregate(&self) -> Option<&AggregateRequest> {
        self.aggregate.as_ref()
    }

    /// Fields to materialize on each row: the projection, or every field.
    pub fn selected_fields(&self) -> Vec<&'a FieldInfo> {
        match &self.projection {
            Some(names) => names.iter().filter_map(|n| self.entity.field(n)).collect(),
            None => self.entity.fields.iter().collect(),
        }
    }
}

/// Validate a descriptor against the entity's schema and compile it.
pub fn build_query<'a>(
    catalog: &'a Catalog,
    entity: &'a EntitySchema,
    descriptor: &QueryDescriptor,
) -> Result<ExecutablePlan<'a>, QueryError> {
    let predicates = compile_filters(entity, &descriptor.filters)?;

    if let Some(sort) = &descriptor.sort {
        lookup_field(entity, &sort.field)?;
    }

    let projection = match &descriptor.projection {
        None => None,
        Some(fields) if fields.is_empty() => {
            return Err(QueryError::Validation("projection must name at least one field".into()));
        }
        Some(fields) => {
            let mut out: Vec<String> = Vec::with_capacity(fields.len());
            for f in fields {
                lookup_field(entity, f)?;
                if !out.contains(f) {
                    out.push(f.clone());
                }
            }
            Some(out)
        }
    };

    let include = match &descriptor.include {
        None => None,
        Some(name) => {
            let relation = entity.relation(name).ok_or_else(|| {
                QueryError::Validation(format!("'{}' is not a relation of '{}'", name, entity.name))
            })?;
            let target = catalog
                .entity(&relation.target)
                .ok_or_else(|| QueryError::UnknownEntity(relation.target.clone()))?;
            Some(IncludePlan { relation, target })
        }
    };

    Ok(ExecutablePlan {
        entity,
        predicates,
        sort: descriptor.sort.clone(),
        projection,
        include,
        limit: descriptor.limit.map(|n| n.min(MAX_LIMIT)),
        offset: descriptor.offset,
        aggregate: None,
    })
}

/// Compile an aggregate over the records matching `filters`.
pub fn build_aggregate<'a>(
    entity: &'a EntitySchema,
    request: &AggregateRequest,
    filters: &[FilterPredicate],
) -> Result<ExecutablePlan<'a>, QueryError> {
    if let Some(name) = request.field() {
        let field = lookup_field(entity, name)?;
        if !field.field_type.is_numeric() {
            return Err(QueryError::Validation(format!(
                "{} requires a numeric field; '{}' is {}",
                request.response_key(),
                name,
                field.field_type.name()
            )));
        }
    }
    let predicates = compile_filters(entity, filters)?;
    Ok(ExecutablePlan {
        entity,
        predicates,
        sort: None,
        projection: None,
        include: None,
        limit: None,
        offset: None,
        aggregate: Some(request.clone()),
    })
}

fn lookup_field<'a>(entity: &'a EntitySchema, name: &str) -> Result<&'a FieldInfo, QueryError> {
    entity
        .field(name)
        .ok_or_else(|| QueryError::unknown_field(&entity.name, name))
}

fn compile_filters(entity: &EntitySchema, filters: &[FilterPredicate]) -> Result<Vec<CompiledPredicate>, QueryError> {
    filters.iter().map(|p| compile_predicate(entity, p)).collect()
}

fn compile_predicate(entity: &EntitySchema, p: &FilterPredicate) -> Result<CompiledPredicate, QueryError> {
    let field = lookup_field(entity, &p.field)?;
    check_arity(p)?;
    if p.op.is_ordering() && !field.field_type.is_orderable() {
        return Err(QueryError::Validation(format!(
            "operator '{}' cannot be applied to {} field '{}'",
            p.op.name(),
            field.field_type.name(),
            field.name
        )));
    }

    let operand = |i: usize| coerce_operand(field, p.op, &p.operands[i]);
    let condition = match p.op {
        Operator::Equals if p.operands[0].is_null() => Condition::IsNull,
        Operator::NotEquals if p.operands[0].is_null() => Condition::IsNotNull,
        Operator::Equals => Condition::Eq(operand(0)?),
        Operator::NotEquals => Condition::Ne(operand(0)?),
        Operator::Gt => Condition::Gt(operand(0)?),
        Operator::Gte => Condition::Gte(operand(0)?),
        Operator::Lt => Condition::Lt(operand(0)?),
        Operator::Lte => Condition::Lte(operand(0)?),
        Operator::InSet => Condition::In(
            p.operands
                .iter()
                .map(|v| coerce_operand(field, p.op, v))
                .collect::<Result<_, _>>()?,
        ),
        Operator::IsNull => Condition::IsNull,
        Operator::IsNotNull => Condition::IsNotNull,
        Operator::Range => Condition::Between(operand(0)?, operand(1)?),
    };

    Ok(CompiledPredicate {
        field: field.name.clone(),
        field_type: field.field_type,
        condition,
    })
}

fn check_arity(p: &FilterPredicate) -> Result<(), QueryError> {
    let n = p.operands.len();
    let ok = match p.op {
        Operator::IsNull | Operator::IsNotNull => n == 0,
        Operator::Range => n == 2,
        Operator::InSet => n > 0,
        _ => n == 1,
    };
    if ok {
        return Ok(());
    }
    let expected = match p.op {
        Operator::IsNull | Operator::IsNotNull => "no operands",
        Operator::Range => "exactly 2 operands",
        Operator::InSet => "a non-empty set",
        _ => "exactly 1 operand",
    };
    Err(QueryError::Validation(format!(
        "operator '{}' on '{}' expects {}, got {}",
        p.op.name(),
        p.field,
        expected,
        n
    )))
}

/// Check an operand against the field type and normalize its JSON representation.
pub(crate) fn coerce_operand(field: &FieldInfo, op: Operator, v: &Value) -> Result<Value, QueryError> {
    let mismatch = || {
        QueryError::Validation(format!(
            "operator '{}' on {} field '{}' got incompatible operand {}",
            op.name(),
            field.field_type.name(),
            field.name,
            v
        ))
    };
    match (field.field_type, v) {
        (_, Value::Null) => Err(QueryError::Validation(format!(
            "operator '{}' on '{}' does not accept null operands",
            op.name(),
            field.name
        ))),
        (FieldType::Text, Value::String(_)) | (FieldType::Boolean, Value::Bool(_)) => Ok(v.clone()),
        (FieldType::Integer, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i.into()))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::Number((f as i64).into())),
                    _ => Err(mismatch()),
                }
            }
        }
        (FieldType::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(mismatch),
        _ => Err(mismatch()),
    }
}
