//! Query engine: validate → compile → execute → shape result.

use crate::error::QueryError;
use crate::query::plan::{build_aggregate, build_query};
use crate::query::{AggregateRequest, ExecutablePlan, FilterPredicate, QueryDescriptor, QueryOutput, Record, ScalarValue};
use crate::schema::{Catalog, EntitySchema, IncludeDirection};
use crate::store::EntityStore;
use serde_json::Value;
use std::sync::Arc;

/// Stateless apart from the immutable catalog; safe to share across requests.
#[derive(Clone)]
pub struct QueryEngine {
    catalog: Arc<Catalog>,
}

impl QueryEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        QueryEngine { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn entity(&self, name: &str) -> Result<&EntitySchema, QueryError> {
        self.catalog
            .entity(name)
            .ok_or_else(|| QueryError::UnknownEntity(name.to_string()))
    }

    /// Validate the descriptor against the entity's schema and compile it.
    pub fn build_query(&self, entity: &str, descriptor: &QueryDescriptor) -> Result<ExecutablePlan<'_>, QueryError> {
        let entity = self.entity(entity)?;
        build_query(&self.catalog, entity, descriptor)
    }

    /// Compile an aggregate plan; see [`QueryEngine::aggregate`].
    pub fn build_aggregate(
        &self,
        entity: &str,
        request: &AggregateRequest,
        filters: &[FilterPredicate],
    ) -> Result<ExecutablePlan<'_>, QueryError> {
        build_aggregate(self.entity(entity)?, request, filters)
    }

    /// Run a plan against the store. Store failures are returned unchanged; no retries.
    pub async fn execute(&self, plan: &ExecutablePlan<'_>, store: &dyn EntityStore) -> Result<QueryOutput, QueryError> {
        tracing::debug!(
            entity = %plan.entity().name,
            store = store.store_type(),
            predicates = plan.predicates().len(),
            aggregate = ?plan.aggregate(),
            "execute plan"
        );
        match plan.aggregate() {
            Some(request) => Ok(QueryOutput::Scalar(store.aggregate(plan, request).await?)),
            None => {
                let rows = store.select(plan).await?;
                Ok(QueryOutput::Rows(shape(plan, rows)))
            }
        }
    }

    /// Build and execute a row query in one step.
    pub async fn find(
        &self,
        entity: &str,
        descriptor: &QueryDescriptor,
        store: &dyn EntityStore,
    ) -> Result<Vec<Record>, QueryError> {
        let plan = self.build_query(entity, descriptor)?;
        match self.execute(&plan, store).await? {
            QueryOutput::Rows(rows) => Ok(rows),
            QueryOutput::Scalar(_) => Ok(Vec::new()),
        }
    }

    /// count ≥ 0 always; sum/min/max/avg over no matching values is `Null`.
    pub async fn aggregate(
        &self,
        entity: &str,
        request: &AggregateRequest,
        filters: &[FilterPredicate],
        store: &dyn EntityStore,
    ) -> Result<ScalarValue, QueryError> {
        let plan = self.build_aggregate(entity, request, filters)?;
        match self.execute(&plan, store).await? {
            QueryOutput::Scalar(s) => Ok(s),
            QueryOutput::Rows(_) => Ok(ScalarValue::Null),
        }
    }
}

/// Apply projection and make sure a requested inclusion is present on every row.
fn shape(plan: &ExecutablePlan<'_>, rows: Vec<Record>) -> Vec<Record> {
    let include = plan.include();
    let projection = plan.projection();
    rows.into_iter()
        .map(|mut row| {
            if let Some(inc) = include {
                if !row.contains_key(&inc.relation.name) {
                    let empty = match inc.relation.direction {
                        IncludeDirection::ToOne => Value::Null,
                        IncludeDirection::ToMany => Value::Array(Vec::new()),
                    };
                    row.insert(inc.relation.name.clone(), empty);
                }
            }
            if let Some(fields) = projection {
                row.retain(|k, _| {
                    fields.iter().any(|f| f == k) || include.is_some_and(|inc| inc.relation.name == *k)
                });
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortSpec;
    use crate::schema::builtin_catalog;
    use crate::store::InMemoryStore;
    use serde_json::json;

    struct Fixture {
        engine: QueryEngine,
        store: InMemoryStore,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(builtin_catalog().unwrap());
        Fixture {
            engine: QueryEngine::new(catalog.clone()),
            store: InMemoryStore::new(catalog),
        }
    }

    async fn seed_users(f: &Fixture, credits: &[Value]) {
        let user = f.engine.entity("user").unwrap();
        for (i, credit) in credits.iter().enumerate() {
            let row = json!({"email": format!("u{}@x.io", i), "password": "pw", "credit": credit});
            f.store.insert(user, row.as_object().cloned().unwrap()).await.unwrap();
        }
    }

    async fn credits(f: &Fixture, d: QueryDescriptor) -> Vec<Value> {
        f.engine
            .find("user", &d, &f.store)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["credit"].clone())
            .collect()
    }

    async fn ids(f: &Fixture, d: QueryDescriptor) -> Vec<i64> {
        f.engine
            .find("user", &d, &f.store)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect()
    }

    fn standard_credits() -> Vec<Value> {
        [100, 200, 300, 300, 400].iter().map(|c| json!(c)).collect()
    }

    #[tokio::test]
    async fn test_credit_scenario() {
        let f = fixture();
        seed_users(&f, &standard_credits()).await;

        let gte = credits(&f, QueryDescriptor::new().filter(FilterPredicate::gte("credit", 300))).await;
        assert_eq!(gte, vec![json!(300), json!(300), json!(400)]);

        let between = credits(&f, QueryDescriptor::new().filter(FilterPredicate::range("credit", 100, 300))).await;
        assert_eq!(between.len(), 4);

        let ne = credits(&f, QueryDescriptor::new().filter(FilterPredicate::not_equals("credit", 300))).await;
        assert_eq!(ne, vec![json!(100), json!(200), json!(400)]);

        let sum = f
            .engine
            .aggregate("user", &AggregateRequest::Sum("credit".into()), &[], &f.store)
            .await
            .unwrap();
        assert_eq!(sum, ScalarValue::Integer(1300));
    }

    #[tokio::test]
    async fn test_range_equals_gte_intersect_lte() {
        let f = fixture();
        seed_users(&f, &standard_credits()).await;
        for (lo, hi) in [(100, 300), (300, 300), (400, 100), (0, 1000)] {
            let range = ids(&f, QueryDescriptor::new().filter(FilterPredicate::range("credit", lo, hi))).await;
            let both = ids(
                &f,
                QueryDescriptor::new()
                    .filter(FilterPredicate::gte("credit", lo))
                    .filter(FilterPredicate::lte("credit", hi)),
            )
            .await;
            assert_eq!(range, both, "range({}, {})", lo, hi);
        }
        let single = credits(&f, QueryDescriptor::new().filter(FilterPredicate::range("credit", 300, 300))).await;
        assert_eq!(single, vec![json!(300), json!(300)]);
        let inverted = ids(&f, QueryDescriptor::new().filter(FilterPredicate::range("credit", 400, 100))).await;
        assert!(inverted.is_empty());
    }

    #[tokio::test]
    async fn test_aggregates_on_empty_collection() {
        let f = fixture();
        let count = f.engine.aggregate("user", &AggregateRequest::Count, &[], &f.store).await.unwrap();
        assert_eq!(count, ScalarValue::Integer(0));
        for request in [
            AggregateRequest::Sum("credit".into()),
            AggregateRequest::Min("credit".into()),
            AggregateRequest::Max("credit".into()),
            AggregateRequest::Avg("credit".into()),
        ] {
            let v = f.engine.aggregate("user", &request, &[], &f.store).await.unwrap();
            assert_eq!(v, ScalarValue::Null, "{:?}", request);
        }
    }

    #[tokio::test]
    async fn test_aggregate_respects_filters() {
        let f = fixture();
        seed_users(&f, &standard_credits()).await;
        let filters = [FilterPredicate::gte("credit", 300)];
        let count = f.engine.aggregate("user", &AggregateRequest::Count, &filters, &f.store).await.unwrap();
        assert_eq!(count, ScalarValue::Integer(3));
        let avg = f
            .engine
            .aggregate("user", &AggregateRequest::Avg("credit".into()), &[], &f.store)
            .await
            .unwrap();
        assert_eq!(avg, ScalarValue::Float(260.0));
        let max = f
            .engine
            .aggregate("user", &AggregateRequest::Max("credit".into()), &[], &f.store)
            .await
            .unwrap();
        assert_eq!(max, ScalarValue::Integer(400));
    }

    #[tokio::test]
    async fn test_singleton_in_set_matches_equals() {
        let f = fixture();
        seed_users(&f, &standard_credits()).await;
        for v in [100, 300, 999] {
            let in_set = ids(&f, QueryDescriptor::new().filter(FilterPredicate::in_set("credit", [v]))).await;
            let eq = ids(&f, QueryDescriptor::new().filter(FilterPredicate::equals("credit", v))).await;
            assert_eq!(in_set, eq);
        }
    }

    #[tokio::test]
    async fn test_sort_reverses_without_ties() {
        let f = fixture();
        seed_users(&f, &[json!(300), json!(100), json!(400), json!(200)]).await;
        let asc = ids(&f, QueryDescriptor::new().sort(SortSpec::ascending("credit"))).await;
        let mut desc = ids(&f, QueryDescriptor::new().sort(SortSpec::descending("credit"))).await;
        desc.reverse();
        assert_eq!(asc, desc);
        assert_eq!(asc, vec![2, 4, 1, 3]);
    }

    #[tokio::test]
    async fn test_sort_keeps_ties_in_primary_key_order() {
        let f = fixture();
        seed_users(&f, &standard_credits()).await;
        let desc = ids(&f, QueryDescriptor::new().sort(SortSpec::descending("credit"))).await;
        assert_eq!(desc, vec![5, 3, 4, 2, 1]);
        let asc = ids(&f, QueryDescriptor::new().sort(SortSpec::ascending("credit"))).await;
        assert_eq!(asc, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_null_filters_and_sort_placement() {
        let f = fixture();
        seed_users(&f, &[json!(100), Value::Null, json!(300)]).await;
        let nulls = ids(&f, QueryDescriptor::new().filter(FilterPredicate::is_null("credit"))).await;
        assert_eq!(nulls, vec![2]);
        let not_null = ids(&f, QueryDescriptor::new().filter(FilterPredicate::is_not_null("credit"))).await;
        assert_eq!(not_null, vec![1, 3]);
        let asc = ids(&f, QueryDescriptor::new().sort(SortSpec::ascending("credit"))).await;
        assert_eq!(asc, vec![1, 3, 2]);
        let desc = ids(&f, QueryDescriptor::new().sort(SortSpec::descending("credit"))).await;
        assert_eq!(desc, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_projection_omits_unrequested_fields() {
        let f = fixture();
        seed_users(&f, &[Value::Null]).await;
        let rows = f
            .engine
            .find("user", &QueryDescriptor::new().select(["id", "credit", "level"]), &f.store)
            .await
            .unwrap();
        let row = &rows[0];
        assert_eq!(row.len(), 3);
        assert_eq!(row["credit"], Value::Null);
        assert!(!row.contains_key("email"));
        assert!(!row.contains_key("password"));
    }

    #[tokio::test]
    async fn test_include_attaches_relation_or_null() {
        let f = fixture();
        let dept = f.engine.entity("department").unwrap();
        let user = f.engine.entity("user").unwrap();
        f.store
            .insert(dept, json!({"name": "Sales"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        f.store
            .insert(user, json!({"email": "a@x.io", "password": "p", "departmentId": 1}).as_object().cloned().unwrap())
            .await
            .unwrap();
        f.store
            .insert(user, json!({"email": "b@x.io", "password": "p"}).as_object().cloned().unwrap())
            .await
            .unwrap();

        let rows = f
            .engine
            .find("user", &QueryDescriptor::new().include("department").select(["id"]), &f.store)
            .await
            .unwrap();
        assert_eq!(rows[0]["department"]["name"], json!("Sales"));
        assert_eq!(rows[1]["department"], Value::Null);
        assert!(!rows[0].contains_key("email"));

        let depts = f
            .engine
            .find("department", &QueryDescriptor::new().include("users"), &f.store)
            .await
            .unwrap();
        assert_eq!(depts[0]["users"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_limit_and_offset() {
        let f = fixture();
        seed_users(&f, &standard_credits()).await;
        let page = ids(&f, QueryDescriptor::new().offset(1).limit(2)).await;
        assert_eq!(page, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_entity() {
        let f = fixture();
        let err = f.engine.find("invoice", &QueryDescriptor::new(), &f.store).await.unwrap_err();
        assert!(matches!(err, QueryError::UnknownEntity(_)));
    }
}
