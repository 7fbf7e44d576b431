//! Entity store abstraction and its implementations.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use crate::error::StoreError;
use crate::query::{AggregateRequest, ExecutablePlan, Record, ScalarValue};
use crate::schema::EntitySchema;
use async_trait::async_trait;

/// Persistent tabular backend. Held as `Arc<dyn EntityStore>` and passed into the query engine.
///
/// Implementations must agree on filter, sort and aggregate semantics so a plan
/// returns the same rows regardless of the backend.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert one record and return it with its assigned primary key.
    async fn insert(&self, entity: &EntitySchema, values: Record) -> Result<Record, StoreError>;

    async fn fetch(&self, entity: &EntitySchema, id: i64) -> Result<Option<Record>, StoreError>;

    /// Apply `changes` to the record; fields not present are left untouched.
    async fn update(&self, entity: &EntitySchema, id: i64, changes: Record) -> Result<Option<Record>, StoreError>;

    /// Returns false when no record had that id.
    async fn delete(&self, entity: &EntitySchema, id: i64) -> Result<bool, StoreError>;

    async fn select(&self, plan: &ExecutablePlan<'_>) -> Result<Vec<Record>, StoreError>;

    async fn aggregate(&self, plan: &ExecutablePlan<'_>, request: &AggregateRequest) -> Result<ScalarValue, StoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    fn store_type(&self) -> &'static str;
}
