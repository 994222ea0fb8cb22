//! The execution plan produced by the optimizer: an ordered, immutable list
//! of cost-estimated steps used for introspection and for the scheduler's
//! memory/complexity estimation. The plan never executes directly.

use kusto_lang::OperationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    TableScan,
    Filter,
    Project,
    Extend,
    Aggregate,
    Sort,
    Top,
    Limit,
    Distinct,
    Join,
    Union,
}

impl StepKind {
    fn from_op(kind: &OperationKind) -> Self {
        match kind {
            OperationKind::Where(_) => StepKind::Filter,
            OperationKind::Project(_) => StepKind::Project,
            OperationKind::Extend(_) => StepKind::Extend,
            OperationKind::Summarize { .. } => StepKind::Aggregate,
            OperationKind::Order(_) => StepKind::Sort,
            OperationKind::Top { .. } => StepKind::Top,
            OperationKind::Limit(_) => StepKind::Limit,
            OperationKind::Distinct(_) => StepKind::Distinct,
            OperationKind::Join { .. } => StepKind::Join,
            OperationKind::Union(_) => StepKind::Union,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    pub description: String,
    pub estimated_input_rows: u64,
    pub estimated_output_rows: u64,
    pub estimated_cost: f64,
    pub sql_fragment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub steps: Vec<Step>,
}

impl ExecutionPlan {
    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.estimated_cost).sum()
    }

    pub fn estimated_output_rows(&self) -> u64 {
        self.steps
            .last()
            .map(|s| s.estimated_output_rows)
            .unwrap_or(0)
    }
}

/// Unit cost per operation kind, matching the ordering table
/// `scan < filter < project < extend < top < limit < order < union < summarize < join`.
pub fn unit_cost(kind: &OperationKind) -> f64 {
    match kind.cost_tag() {
        "filter" => 2.0,
        "project" => 3.0,
        "extend" => 4.0,
        "top" => 5.0,
        "limit" => 6.0,
        "order" => 7.0,
        "union" => 8.0,
        "summarize" => 9.0,
        "join" => 10.0,
        _ => unreachable!("unknown cost tag"),
    }
}

/// Relative ordering rank used by the operation-reordering rewrite. Lower
/// sorts earlier (closer to the table scan).
pub fn cost_rank(tag: &str) -> u8 {
    match tag {
        "filter" => 0,
        "project" => 1,
        "extend" => 2,
        "top" => 3,
        "limit" => 4,
        "order" => 5,
        "union" => 6,
        "summarize" => 7,
        "join" => 8,
        _ => 9,
    }
}

/// Output-cardinality multiplier applied to the running row estimate.
pub fn cardinality_multiplier(kind: &OperationKind, input_rows: u64) -> f64 {
    match kind {
        OperationKind::Where(_) => 0.1,
        OperationKind::Summarize { .. } => 0.01,
        OperationKind::Distinct(_) => 0.8,
        OperationKind::Top { n, .. } => {
            if let Some((kusto_core::Value::Integer(limit), _)) = n.as_literal() {
                let limit = (*limit).max(0) as u64;
                if input_rows == 0 {
                    1.0
                } else {
                    (limit.min(input_rows) as f64) / (input_rows as f64)
                }
            } else {
                1.0
            }
        }
        _ => 1.0,
    }
}

pub fn build_plan(
    table_name: &str,
    pipeline: &[kusto_lang::Operation],
    initial_row_count: u64,
) -> ExecutionPlan {
    let mut steps = Vec::with_capacity(pipeline.len() + 1);
    let mut rows = initial_row_count;

    steps.push(Step {
        kind: StepKind::TableScan,
        description: format!("scan {table_name}"),
        estimated_input_rows: rows,
        estimated_output_rows: rows,
        estimated_cost: 1.0,
        sql_fragment: None,
    });

    for op in pipeline {
        let input_rows = rows;
        let multiplier = cardinality_multiplier(&op.kind, input_rows);
        let output_rows = ((input_rows as f64) * multiplier).round() as u64;
        steps.push(Step {
            kind: StepKind::from_op(&op.kind),
            description: describe(&op.kind),
            estimated_input_rows: input_rows,
            estimated_output_rows: output_rows,
            estimated_cost: unit_cost(&op.kind) * (input_rows.max(1) as f64).log10().max(1.0),
            sql_fragment: None,
        });
        rows = output_rows;
    }

    ExecutionPlan { steps }
}

fn describe(kind: &OperationKind) -> String {
    match kind {
        OperationKind::Where(_) => "filter rows".to_string(),
        OperationKind::Project(cols) => format!("project {} column(s)", cols.len()),
        OperationKind::Extend(assigns) => format!("extend {} column(s)", assigns.len()),
        OperationKind::Summarize { aggs, .. } => format!("aggregate {} expr(s)", aggs.len()),
        OperationKind::Order(items) => format!("sort by {} key(s)", items.len()),
        OperationKind::Top { .. } => "top-n".to_string(),
        OperationKind::Limit(_) => "limit".to_string(),
        OperationKind::Distinct(_) => "distinct".to_string(),
        OperationKind::Join { table, .. } => format!("join {}", table.name),
        OperationKind::Union(tables) => format!("union {} table(s)", tables.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_ordering_matches_spec_table() {
        assert!(cost_rank("filter") < cost_rank("project"));
        assert!(cost_rank("project") < cost_rank("extend"));
        assert!(cost_rank("extend") < cost_rank("top"));
        assert!(cost_rank("top") < cost_rank("limit"));
        assert!(cost_rank("limit") < cost_rank("order"));
        assert!(cost_rank("order") < cost_rank("union"));
        assert!(cost_rank("union") < cost_rank("summarize"));
        assert!(cost_rank("summarize") < cost_rank("join"));
    }

    #[test]
    fn plan_includes_leading_table_scan() {
        let plan = build_plan("Users", &[], 1_000_000);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].kind, StepKind::TableScan);
    }
}
