//! Declarative query layer: descriptors, plan compilation, evaluation, engine.

mod descriptor;
mod engine;
pub mod eval;
pub mod plan;
mod result;

pub use descriptor::*;
pub use engine::QueryEngine;
pub use plan::{build_aggregate, build_query, CompiledPredicate, Condition, ExecutablePlan, IncludePlan};
pub use result::*;
