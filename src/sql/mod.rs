//! PostgreSQL statements for plans and CRUD. Identifiers come from the catalog; values are always bound.

mod builder;
mod params;

pub use builder::{aggregate_plan, delete, insert, quoted, select_by_id, select_plan, update, QueryBuf};
pub use params::PgBindValue;
