//! Builds parameterized SELECT, aggregate, INSERT, UPDATE, DELETE from plans and entity schemas.

use crate::query::{AggregateRequest, CompiledPredicate, Condition, ExecutablePlan, IncludePlan, Record, SortDirection};
use crate::schema::{EntitySchema, FieldInfo, FieldType, IncludeDirection};
use serde_json::Value;

const MAIN_ALIAS: &str = "main";
const REL_ALIAS: &str = "rel";

/// Quote identifier for PostgreSQL (safe: names only come from the catalog).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its typed placeholder, e.g. `$2::BIGINT`.
    fn push_param(&mut self, v: Value, ty: FieldType) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), ty.pg_type())
    }
}

fn column(alias: &str, field: &str) -> String {
    format!("{}.{}", alias, quoted(field))
}

fn column_list(fields: &[&FieldInfo], alias: &str) -> String {
    fields
        .iter()
        .map(|f| format!("{} AS {}", column(alias, &f.name), quoted(&f.name)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn all_columns(entity: &EntitySchema) -> String {
    entity.fields.iter().map(|f| quoted(&f.name)).collect::<Vec<_>>().join(", ")
}

fn comparison(col: &str, op: &str, v: &Value, ty: FieldType, q: &mut QueryBuf) -> String {
    let ph = q.push_param(v.clone(), ty);
    format!("{} {} {}", col, op, ph)
}

/// Text ordering uses byte order ("C" collation), matching the in-memory store.
fn ordered(col: String, ty: FieldType) -> String {
    match ty {
        FieldType::Text => format!("{} COLLATE \"C\"", col),
        _ => col,
    }
}

fn predicate_sql(p: &CompiledPredicate, q: &mut QueryBuf) -> String {
    let col = column(MAIN_ALIAS, &p.field);
    let ty = p.field_type;
    match &p.condition {
        Condition::Eq(v) => comparison(&col, "=", v, ty, q),
        Condition::Ne(v) => comparison(&col, "<>", v, ty, q),
        Condition::Gt(v) => comparison(&ordered(col, ty), ">", v, ty, q),
        Condition::Gte(v) => comparison(&ordered(col, ty), ">=", v, ty, q),
        Condition::Lt(v) => comparison(&ordered(col, ty), "<", v, ty, q),
        Condition::Lte(v) => comparison(&ordered(col, ty), "<=", v, ty, q),
        Condition::In(values) => {
            let placeholders: Vec<String> = values.iter().map(|v| q.push_param(v.clone(), ty)).collect();
            format!("{} IN ({})", col, placeholders.join(", "))
        }
        Condition::IsNull => format!("{} IS NULL", col),
        Condition::IsNotNull => format!("{} IS NOT NULL", col),
        Condition::Between(lo, hi) => {
            let lo = q.push_param(lo.clone(), ty);
            let hi = q.push_param(hi.clone(), ty);
            format!("{} BETWEEN {} AND {}", ordered(col, ty), lo, hi)
        }
    }
}

fn where_clause(predicates: &[CompiledPredicate], q: &mut QueryBuf) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = predicates.iter().map(|p| predicate_sql(p, q)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// Scalar subquery attaching related rows: row_to_json for to_one, json_agg for to_many.
fn include_subquery(inc: &IncludePlan<'_>) -> String {
    let target = inc.target;
    let rel = inc.relation;
    let target_fields: Vec<&FieldInfo> = target.fields.iter().collect();
    let sub_from = format!(
        "{} {} WHERE {} = {}",
        quoted(&target.name),
        REL_ALIAS,
        column(REL_ALIAS, &rel.foreign_field),
        column(MAIN_ALIAS, &rel.local_field)
    );
    let cols = column_list(&target_fields, REL_ALIAS);
    let order = column(REL_ALIAS, &target.primary_key);
    match rel.direction {
        IncludeDirection::ToOne => format!(
            "(SELECT row_to_json(sub) FROM (SELECT {} FROM {} ORDER BY {} LIMIT 1) sub)",
            cols, sub_from, order
        ),
        IncludeDirection::ToMany => format!(
            "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {} ORDER BY {}) sub)",
            cols, sub_from, order
        ),
    }
}

/// SELECT for a row plan: projection, optional include, AND-ed filters, sort with primary key tie-break, paging.
pub fn select_plan(plan: &ExecutablePlan<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let entity = plan.entity();

    let mut select_parts = vec![column_list(&plan.selected_fields(), MAIN_ALIAS)];
    if let Some(inc) = plan.include() {
        select_parts.push(format!("{} AS {}", include_subquery(&inc), quoted(&inc.relation.name)));
    }

    let where_sql = where_clause(plan.predicates(), &mut q);
    let pk = column(MAIN_ALIAS, &entity.primary_key);
    let order_sql = match plan.sort() {
        Some(sort) => {
            let dir = match sort.direction {
                SortDirection::Ascending => "ASC NULLS LAST",
                SortDirection::Descending => "DESC NULLS FIRST",
            };
            let col = column(MAIN_ALIAS, &sort.field);
            let col = match entity.field(&sort.field) {
                Some(f) => ordered(col, f.field_type),
                None => col,
            };
            format!(" ORDER BY {} {}, {} ASC", col, dir, pk)
        }
        None => format!(" ORDER BY {} ASC", pk),
    };
    let limit_sql = plan.limit().map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_sql = plan.offset().map(|n| format!(" OFFSET {}", n)).unwrap_or_default();

    q.sql = format!(
        "SELECT {} FROM {} {}{}{}{}{}",
        select_parts.join(", "),
        quoted(&entity.name),
        MAIN_ALIAS,
        where_sql,
        order_sql,
        limit_sql,
        offset_sql
    );
    q
}

/// Single-column aggregate query; the result column is named "value".
pub fn aggregate_plan(plan: &ExecutablePlan<'_>, request: &AggregateRequest) -> QueryBuf {
    let mut q = QueryBuf::new();
    let entity = plan.entity();
    let expr = match request {
        AggregateRequest::Count => "COUNT(*)::BIGINT".to_string(),
        AggregateRequest::Avg(f) => format!("AVG({})::DOUBLE PRECISION", column(MAIN_ALIAS, f)),
        AggregateRequest::Sum(f) | AggregateRequest::Min(f) | AggregateRequest::Max(f) => {
            let func = match request {
                AggregateRequest::Sum(_) => "SUM",
                AggregateRequest::Min(_) => "MIN",
                _ => "MAX",
            };
            let ty = entity.field(f).map(|fi| fi.field_type).unwrap_or(FieldType::Float);
            format!("{}({})::{}", func, column(MAIN_ALIAS, f), ty.pg_type())
        }
    };
    let where_sql = where_clause(plan.predicates(), &mut q);
    q.sql = format!(
        "SELECT {} AS \"value\" FROM {} {}{}",
        expr,
        quoted(&entity.name),
        MAIN_ALIAS,
        where_sql
    );
    q
}

/// SELECT by primary key. Caller binds the id as the sole param.
pub fn select_by_id(entity: &EntitySchema) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        all_columns(entity),
        quoted(&entity.name),
        quoted(&entity.primary_key)
    );
    q
}

/// INSERT of the writable fields present in `values`; the database assigns the primary key and defaults.
pub fn insert(entity: &EntitySchema, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&entity.name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in entity.writable_fields() {
        if let Some(v) = values.get(&f.name) {
            cols.push(quoted(&f.name));
            placeholders.push(q.push_param(v.clone(), f.field_type));
        }
    }
    let returning = all_columns(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only writable fields present in `changes`. Without changes this is a plain select by id.
pub fn update(entity: &EntitySchema, id: i64, changes: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&entity.name);
    let pk = quoted(&entity.primary_key);
    let mut sets = Vec::new();
    for f in entity.writable_fields() {
        if let Some(v) = changes.get(&f.name) {
            let ph = q.push_param(v.clone(), f.field_type);
            sets.push(format!("{} = {}", quoted(&f.name), ph));
        }
    }
    let id_ph = q.push_param(Value::Number(id.into()), FieldType::Integer);
    q.sql = if sets.is_empty() {
        format!("SELECT {} FROM {} WHERE {} = {}", all_columns(entity), table, pk, id_ph)
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
            table,
            sets.join(", "),
            pk,
            id_ph,
            all_columns(entity)
        )
    };
    q
}

/// DELETE by id. Caller binds the id as the sole param.
pub fn delete(entity: &EntitySchema) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1 RETURNING {}",
        quoted(&entity.name),
        quoted(&entity.primary_key),
        quoted(&entity.primary_key)
    );
    q
}
