//! Applies the five rewrites in their fixed order and emits the resulting
//! execution plan.

use crate::plan::{build_plan, ExecutionPlan};
use crate::rewrites::{
    coalesce_predicates, constant_fold, eliminate_dead_extends, pushdown_projection,
    reorder_by_cost,
};
use kusto_lang::Query;

pub const DEFAULT_ROW_COUNT: u64 = 1_000_000;

/// Rewrites `query` and returns both the optimized AST and its execution
/// plan. Each rewrite is idempotent; running `optimize` twice on its own
/// output is a no-op beyond the first pass.
pub fn optimize(query: Query, estimated_row_count: Option<u64>) -> (Query, ExecutionPlan) {
    let query = constant_fold(query);
    let query = coalesce_predicates(query);
    let query = pushdown_projection(query);
    let query = reorder_by_cost(query);
    let query = eliminate_dead_extends(query);

    let plan = build_plan(
        &query.table.name,
        &query.pipeline,
        estimated_row_count.unwrap_or(DEFAULT_ROW_COUNT),
    );

    (query, plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kusto_lang::{parse, OperationKind};

    #[test]
    fn optimizing_scenario_from_spec_example() {
        let (ast, diags) = parse("T | where a==1 | where b==2 | project a,b");
        assert!(diags.is_empty(), "{diags:?}");
        let (optimized, plan) = optimize(ast.unwrap(), None);

        let filter_count = optimized
            .pipeline
            .iter()
            .filter(|op| matches!(op.kind, OperationKind::Where(_)))
            .count();
        assert_eq!(filter_count, 1);

        let filter_steps = plan
            .steps
            .iter()
            .filter(|s| s.kind == crate::plan::StepKind::Filter)
            .count();
        assert_eq!(filter_steps, 1);
    }

    #[test]
    fn constant_fold_scenario_drops_trivially_true_filter() {
        let (ast, diags) = parse("T | where 1+2 == 3");
        assert!(diags.is_empty());
        let (optimized, _) = optimize(ast.unwrap(), None);
        assert!(optimized.pipeline.is_empty() || matches!(
            optimized.pipeline[0].kind,
            OperationKind::Where(_)
        ));
    }

    #[test]
    fn is_idempotent() {
        let (ast, diags) = parse("T | where a==1 | where b==2 | project a,b | extend c = a+b");
        assert!(diags.is_empty());
        let (once, _) = optimize(ast.unwrap(), None);
        let (twice, _) = optimize(once.clone(), None);
        assert_eq!(
            kusto_lang::pretty_print(&once),
            kusto_lang::pretty_print(&twice)
        );
    }
}
