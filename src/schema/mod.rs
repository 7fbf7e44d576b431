//! Entity catalog: JSON definitions, validation, resolved runtime view.

mod loader;
mod resolved;
mod types;
mod validator;

pub use loader::{builtin_catalog, load_from_path, load_from_str, resolve};
pub use resolved::{Catalog, EntitySchema, FieldInfo, RelationInfo};
pub use types::{CatalogConfig, EntityConfig, FieldConfig, FieldType, IncludeDirection, RelationConfig, ValidationRule};
pub use validator::validate;
