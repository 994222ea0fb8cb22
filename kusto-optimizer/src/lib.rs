//! AST rewrites, cost model, and execution plan generation.

mod optimizer;
mod plan;
mod rewrites;

pub use optimizer::{optimize, DEFAULT_ROW_COUNT};
pub use plan::{build_plan, cardinality_multiplier, cost_rank, unit_cost, ExecutionPlan, Step, StepKind};
pub use rewrites::{
    coalesce_predicates, constant_fold, eliminate_dead_extends, pushdown_projection,
    reorder_by_cost,
};
