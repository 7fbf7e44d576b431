//! Entity Query: declarative filter, sort and aggregate queries over schema-typed
//! entity collections, with CRUD and a JSON HTTP surface.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod query;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use auth::{HmacTokenSigner, TokenSigner};
pub use error::{AppError, AuthError, QueryError, SchemaError, StoreError};
pub use migration::ensure_entity_tables;
pub use query::{
    AggregateRequest, FilterPredicate, Operator, QueryDescriptor, QueryEngine, Record, ScalarValue, SortDirection,
    SortSpec,
};
pub use routes::{app_router, common_routes, entity_routes, user_routes};
pub use schema::{builtin_catalog, load_from_path, load_from_str, Catalog, EntitySchema};
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
pub use store::{EntityStore, InMemoryStore, PgStore};
