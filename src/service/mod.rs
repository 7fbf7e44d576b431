//! CrudService: validated create/read/update/delete over an entity store.

mod crud;
mod validation;
pub use crud::{parse_id, CrudService};
pub use validation::RequestValidator;
