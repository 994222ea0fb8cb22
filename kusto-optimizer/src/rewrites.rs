//! The five ordered, idempotent AST rewrites. Each operates on an owned
//! [`Query`] and returns a new one; subtrees that are untouched are cloned
//! rather than shared, matching the "optimizer returns a new AST" ownership
//! rule — this crate takes the boxed sum-type route (no arena), so cloning
//! is the simplest way to honor "original and optimized ASTs never share
//! mutable subtrees."

use kusto_core::Value;
use kusto_lang::{
    Agg, Assign, BinaryOp, Expr, ExprKind, LetStatement, Operation, OperationKind, OrderItem,
    ProjCol, Query, UnaryOp,
};
use std::collections::HashSet;

/// 1. Constant folding: binary/unary nodes whose operands are all literals
/// fold to a single literal. Division by zero is left unfolded.
pub fn constant_fold(query: Query) -> Query {
    map_exprs(query, &fold_expr)
}

fn fold_expr(expr: Expr) -> Expr {
    let span = expr.span;
    match expr.kind {
        ExprKind::Unary(op, operand) => {
            let operand = fold_expr(*operand);
            if let Some((value, _)) = operand.as_literal() {
                if let Some(folded) = eval_unary(op, value) {
                    return literal_expr(folded, span);
                }
            }
            Expr {
                kind: ExprKind::Unary(op, Box::new(operand)),
                span,
            }
        }
        ExprKind::Binary(op, left, right) => {
            let left = fold_expr(*left);
            let right = fold_expr(*right);
            if let (Some((lv, _)), Some((rv, _))) = (left.as_literal(), right.as_literal()) {
                if let Some(folded) = eval_binary(op, lv, rv) {
                    return literal_expr(folded, span);
                }
            }
            Expr {
                kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
                span,
            }
        }
        ExprKind::Member(base, name, computed) => Expr {
            kind: ExprKind::Member(Box::new(fold_expr(*base)), name, computed),
            span,
        },
        ExprKind::Call(name, args) => Expr {
            kind: ExprKind::Call(name, args.into_iter().map(fold_expr).collect()),
            span,
        },
        ExprKind::Case(arms, else_branch) => Expr {
            kind: ExprKind::Case(
                arms.into_iter()
                    .map(|(w, t)| (fold_expr(w), fold_expr(t)))
                    .collect(),
                else_branch.map(|e| Box::new(fold_expr(*e))),
            ),
            span,
        },
        ExprKind::Array(items) => Expr {
            kind: ExprKind::Array(items.into_iter().map(fold_expr).collect()),
            span,
        },
        other => Expr { kind: other, span },
    }
}

fn literal_expr(value: Value, span: kusto_lang::Span) -> Expr {
    let dt = value.data_type();
    Expr {
        kind: ExprKind::Literal(value, dt),
        span,
    }
}

fn eval_unary(op: UnaryOp, value: &Value) -> Option<Value> {
    match (op, value) {
        (UnaryOp::Not, Value::Boolean(b)) => Some(Value::Boolean(!b)),
        (UnaryOp::Neg, Value::Integer(i)) => Some(Value::Integer(-i)),
        (UnaryOp::Neg, Value::Float(f)) => Some(Value::Float(-f)),
        (UnaryOp::Pos, Value::Integer(_) | Value::Float(_)) => Some(value.clone()),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> Option<Value> {
    use BinaryOp::*;
    match (op, l, r) {
        (Or, Value::Boolean(a), Value::Boolean(b)) => Some(Value::Boolean(*a || *b)),
        (And, Value::Boolean(a), Value::Boolean(b)) => Some(Value::Boolean(*a && *b)),
        (Eq, _, _) => Some(Value::Boolean(values_equal(l, r))),
        (Ne, _, _) => Some(Value::Boolean(!values_equal(l, r))),
        (Lt, _, _) => compare_numeric(l, r).map(|o| Value::Boolean(o.is_lt())),
        (Le, _, _) => compare_numeric(l, r).map(|o| Value::Boolean(o.is_le())),
        (Gt, _, _) => compare_numeric(l, r).map(|o| Value::Boolean(o.is_gt())),
        (Ge, _, _) => compare_numeric(l, r).map(|o| Value::Boolean(o.is_ge())),
        (Add, Value::Integer(a), Value::Integer(b)) => a.checked_add(*b).map(Value::Integer),
        (Add, Value::Float(a), Value::Float(b)) => Some(Value::Float(a + b)),
        (Add, Value::String(a), Value::String(b)) => Some(Value::String(format!("{a}{b}"))),
        (Sub, Value::Integer(a), Value::Integer(b)) => a.checked_sub(*b).map(Value::Integer),
        (Sub, Value::Float(a), Value::Float(b)) => Some(Value::Float(a - b)),
        (Mul, Value::Integer(a), Value::Integer(b)) => a.checked_mul(*b).map(Value::Integer),
        (Mul, Value::Float(a), Value::Float(b)) => Some(Value::Float(a * b)),
        (Div, Value::Integer(a), Value::Integer(b)) => {
            if *b == 0 {
                None
            } else {
                Some(Value::Integer(a / b))
            }
        }
        (Div, Value::Float(a), Value::Float(b)) => {
            if *b == 0.0 {
                None
            } else {
                Some(Value::Float(a / b))
            }
        }
        (Mod, Value::Integer(a), Value::Integer(b)) => {
            if *b == 0 {
                None
            } else {
                Some(Value::Integer(a % b))
            }
        }
        (Contains, Value::String(a), Value::String(b)) => {
            Some(Value::Boolean(a.to_lowercase().contains(&b.to_lowercase())))
        }
        (StartsWith, Value::String(a), Value::String(b)) => Some(Value::Boolean(
            a.to_lowercase().starts_with(&b.to_lowercase()),
        )),
        (EndsWith, Value::String(a), Value::String(b)) => {
            Some(Value::Boolean(a.to_lowercase().ends_with(&b.to_lowercase())))
        }
        _ => None,
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
            (*a as f64) == *b
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (Value::Guid(a), Value::Guid(b)) => a.eq_ignore_ascii_case(b),
        (Value::Datetime(a), Value::Datetime(b)) => a == b,
        _ => false,
    }
}

fn compare_numeric(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    let (a, b) = match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => (*a as f64, *b as f64),
        (Value::Float(a), Value::Float(b)) => (*a, *b),
        (Value::Integer(a), Value::Float(b)) => (*a as f64, *b),
        (Value::Float(a), Value::Integer(b)) => (*a, *b as f64),
        (Value::String(a), Value::String(b)) => return a.partial_cmp(b),
        _ => return None,
    };
    a.partial_cmp(&b)
}

/// 2. Predicate pushdown: coalesce consecutive `Where` operations into a
/// single conjunctive filter. Never crosses `Summarize` or `Join` because
/// it only ever merges operations that are already adjacent.
pub fn coalesce_predicates(query: Query) -> Query {
    let mut pipeline = Vec::with_capacity(query.pipeline.len());
    let mut iter = query.pipeline.into_iter().peekable();

    while let Some(op) = iter.next() {
        match op.kind {
            OperationKind::Where(mut merged) => {
                while let Some(next) = iter.peek() {
                    if matches!(next.kind, OperationKind::Where(_)) {
                        let next = iter.next().unwrap();
                        if let OperationKind::Where(cond) = next.kind {
                            let span = merged.span;
                            merged = Expr {
                                kind: ExprKind::Binary(
                                    BinaryOp::And,
                                    Box::new(merged),
                                    Box::new(cond),
                                ),
                                span,
                            };
                        }
                    } else {
                        break;
                    }
                }
                pipeline.push(Operation {
                    span: op.span,
                    kind: OperationKind::Where(merged),
                });
            }
            other => pipeline.push(Operation {
                kind: other,
                span: op.span,
            }),
        }
    }

    Query { pipeline, ..query }
}

/// 3. Projection pushdown: swap an adjacent `(Where, Project)` pair into
/// `(Project, Where)` whenever the `Where` only references columns the
/// `Project` keeps under an unchanged name, repeating to a fixed point so a
/// run of qualifying `Where`s all move below the `Project`.
pub fn pushdown_projection(query: Query) -> Query {
    let mut pipeline = query.pipeline;
    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..pipeline.len().saturating_sub(1) {
            let swap = match (&pipeline[i].kind, &pipeline[i + 1].kind) {
                (OperationKind::Where(cond), OperationKind::Project(cols)) => {
                    let kept = plain_projected_names(cols);
                    identifiers_in_expr(cond).is_subset(&kept)
                }
                _ => false,
            };
            if swap {
                pipeline.swap(i, i + 1);
                changed = true;
            }
        }
    }
    Query { pipeline, ..query }
}

fn plain_projected_names(cols: &[ProjCol]) -> HashSet<String> {
    cols.iter()
        .filter(|c| c.alias.is_none())
        .filter_map(|c| match &c.expr.kind {
            ExprKind::Identifier(name, _) => Some(name.to_lowercase()),
            _ => None,
        })
        .collect()
}

fn identifiers_in_expr(expr: &Expr) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_identifiers(expr, &mut out);
    out
}

fn collect_identifiers(expr: &Expr, out: &mut HashSet<String>) {
    match &expr.kind {
        ExprKind::Identifier(name, _) => {
            out.insert(name.to_lowercase());
        }
        ExprKind::Member(base, _, _) => collect_identifiers(base, out),
        ExprKind::Unary(_, operand) => collect_identifiers(operand, out),
        ExprKind::Binary(_, l, r) => {
            collect_identifiers(l, out);
            collect_identifiers(r, out);
        }
        ExprKind::Call(_, args) => args.iter().for_each(|a| collect_identifiers(a, out)),
        ExprKind::Case(arms, else_branch) => {
            for (w, t) in arms {
                collect_identifiers(w, out);
                collect_identifiers(t, out);
            }
            if let Some(e) = else_branch {
                collect_identifiers(e, out);
            }
        }
        ExprKind::Array(items) => items.iter().for_each(|i| collect_identifiers(i, out)),
        ExprKind::Literal(_, _) => {}
    }
}

/// 4. Operation reordering: adjacent-pair swaps only, gated by the same
/// column-dependency check `pushdown_projection` uses, repeated to a fixed
/// point. `Summarize`, `Join`, and `Union` are a hard barrier — nothing
/// crosses them, so their relative order (and everything else's order
/// relative to them) never changes. Of the remaining kinds, only `Where`
/// migrating toward the source and `Top`/`Limit` migrating toward the sink
/// are legal moves, per the cost table in `plan.rs`. `Where` never crosses
/// `Project` here: that swap is `pushdown_projection`'s sole responsibility,
/// so running this rewrite after it never undoes its work.
pub fn reorder_by_cost(query: Query) -> Query {
    let mut pipeline = query.pipeline;
    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..pipeline.len().saturating_sub(1) {
            if may_swap(&pipeline[i].kind, &pipeline[i + 1].kind) {
                pipeline.swap(i, i + 1);
                changed = true;
            }
        }
    }
    Query { pipeline, ..query }
}

fn is_pipeline_barrier(kind: &OperationKind) -> bool {
    matches!(
        kind,
        OperationKind::Summarize { .. } | OperationKind::Join { .. } | OperationKind::Union(_)
    )
}

/// Whether adjacent pair `(a, b)` may become `(b, a)`.
fn may_swap(a: &OperationKind, b: &OperationKind) -> bool {
    if is_pipeline_barrier(a) || is_pipeline_barrier(b) {
        return false;
    }
    match (a, b) {
        // Where migrates toward the source, but only across an Extend that
        // doesn't produce a column the filter reads.
        (OperationKind::Extend(assigns), OperationKind::Where(cond)) => {
            identifiers_in_expr(cond).is_disjoint(&extend_introduced_names(assigns))
        }
        // Top/Limit migrate toward the sink. Crossing an Extend is always
        // safe (Extend only adds columns); crossing a Project is safe only
        // when Top's sort keys survive the projection.
        (OperationKind::Top { .. } | OperationKind::Limit(_), OperationKind::Extend(_)) => true,
        (OperationKind::Top { n, by }, OperationKind::Project(cols)) => {
            let mut needed = HashSet::new();
            collect_identifiers(n, &mut needed);
            if let Some(items) = by {
                items
                    .iter()
                    .for_each(|item| collect_identifiers(&item.expr, &mut needed));
            }
            needed.is_subset(&projection_output_names(cols))
        }
        (OperationKind::Limit(_), OperationKind::Project(_)) => true,
        _ => false,
    }
}

fn extend_introduced_names(assigns: &[Assign]) -> HashSet<String> {
    assigns.iter().map(|a| a.name.to_lowercase()).collect()
}

/// Every column name visible right after a `Project`: plain kept names plus
/// every alias it introduces.
fn projection_output_names(cols: &[ProjCol]) -> HashSet<String> {
    cols.iter()
        .filter_map(|c| match &c.alias {
            Some(alias) => Some(alias.to_lowercase()),
            None => match &c.expr.kind {
                ExprKind::Identifier(name, _) => Some(name.to_lowercase()),
                _ => None,
            },
        })
        .collect()
}

/// 5. Dead-code elimination: `Extend`-computed columns never referenced by
/// a later operation (and not the pipeline's final stage) are dropped.
pub fn eliminate_dead_extends(query: Query) -> Query {
    let mut pipeline = query.pipeline;
    let len = pipeline.len();

    for i in 0..len {
        let is_last = i + 1 == len;
        let used = if is_last {
            None
        } else {
            let mut used = HashSet::new();
            for op in &pipeline[i + 1..] {
                collect_identifiers_in_operation(&op.kind, &mut used);
            }
            Some(used)
        };

        if let OperationKind::Extend(assigns) = &mut pipeline[i].kind {
            if let Some(used) = used {
                assigns.retain(|a: &Assign| used.contains(&a.name.to_lowercase()));
            }
        }
    }

    pipeline.retain(|op| !matches!(&op.kind, OperationKind::Extend(assigns) if assigns.is_empty()));

    Query { pipeline, ..query }
}

fn collect_identifiers_in_operation(kind: &OperationKind, out: &mut HashSet<String>) {
    match kind {
        OperationKind::Where(expr) => collect_identifiers(expr, out),
        OperationKind::Project(cols) => cols.iter().for_each(|c| collect_identifiers(&c.expr, out)),
        OperationKind::Extend(assigns) => {
            assigns.iter().for_each(|a| collect_identifiers(&a.expr, out))
        }
        OperationKind::Summarize { aggs, group_by } => {
            for agg in aggs {
                if let Some(arg) = &agg.arg {
                    collect_identifiers(arg, out);
                }
            }
            if let Some(group_by) = group_by {
                group_by.iter().for_each(|e| collect_identifiers(e, out));
            }
        }
        OperationKind::Order(items) => items.iter().for_each(|i| collect_identifiers(&i.expr, out)),
        OperationKind::Top { n, by } => {
            collect_identifiers(n, out);
            if let Some(by) = by {
                by.iter().for_each(|i| collect_identifiers(&i.expr, out));
            }
        }
        OperationKind::Limit(expr) => collect_identifiers(expr, out),
        OperationKind::Distinct(cols) => {
            if let Some(cols) = cols {
                cols.iter().for_each(|e| collect_identifiers(e, out));
            }
        }
        OperationKind::Join { on, .. } => collect_identifiers(on, out),
        OperationKind::Union(_) => {}
    }
}

/// Applies `f` to every expression reachable from the query (lets and every
/// pipeline operation's expressions), rebuilding the owning structures.
fn map_exprs(query: Query, f: &impl Fn(Expr) -> Expr) -> Query {
    let lets = query
        .lets
        .into_iter()
        .map(|l| LetStatement {
            expr: f(l.expr),
            ..l
        })
        .collect();

    let pipeline = query
        .pipeline
        .into_iter()
        .map(|op| Operation {
            kind: map_operation_exprs(op.kind, f),
            span: op.span,
        })
        .collect();

    Query {
        lets,
        pipeline,
        table: query.table,
        span: query.span,
    }
}

fn map_operation_exprs(kind: OperationKind, f: &impl Fn(Expr) -> Expr) -> OperationKind {
    match kind {
        OperationKind::Where(e) => OperationKind::Where(f(e)),
        OperationKind::Project(cols) => OperationKind::Project(
            cols.into_iter()
                .map(|c| ProjCol {
                    expr: f(c.expr),
                    alias: c.alias,
                })
                .collect(),
        ),
        OperationKind::Extend(assigns) => OperationKind::Extend(
            assigns
                .into_iter()
                .map(|a| Assign {
                    expr: f(a.expr),
                    name: a.name,
                })
                .collect(),
        ),
        OperationKind::Summarize { aggs, group_by } => OperationKind::Summarize {
            aggs: aggs
                .into_iter()
                .map(|a| Agg {
                    arg: a.arg.map(f),
                    func: a.func,
                    alias: a.alias,
                })
                .collect(),
            group_by: group_by.map(|gb| gb.into_iter().map(f).collect()),
        },
        OperationKind::Order(items) => OperationKind::Order(
            items
                .into_iter()
                .map(|i| OrderItem {
                    expr: f(i.expr),
                    dir: i.dir,
                })
                .collect(),
        ),
        OperationKind::Top { n, by } => OperationKind::Top {
            n: f(n),
            by: by.map(|items| {
                items
                    .into_iter()
                    .map(|i| OrderItem {
                        expr: f(i.expr),
                        dir: i.dir,
                    })
                    .collect()
            }),
        },
        OperationKind::Limit(e) => OperationKind::Limit(f(e)),
        OperationKind::Distinct(cols) => {
            OperationKind::Distinct(cols.map(|cs| cs.into_iter().map(f).collect()))
        }
        OperationKind::Join { kind, table, on } => OperationKind::Join {
            kind,
            table,
            on: f(on),
        },
        OperationKind::Union(tables) => OperationKind::Union(tables),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kusto_lang::parse;

    fn parsed(src: &str) -> Query {
        let (ast, diags) = parse(src);
        assert!(diags.is_empty(), "{diags:?}");
        ast.unwrap()
    }

    #[test]
    fn folds_pure_literal_arithmetic() {
        let q = parsed("T | where 1 + 2 == 3");
        let folded = constant_fold(q);
        match &folded.pipeline[0].kind {
            OperationKind::Where(expr) => {
                assert!(matches!(expr.kind, ExprKind::Literal(Value::Boolean(true), _)));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn does_not_fold_division_by_zero() {
        let q = parsed("T | where x == 1 / 0");
        let folded = constant_fold(q);
        match &folded.pipeline[0].kind {
            OperationKind::Where(expr) => match &expr.kind {
                ExprKind::Binary(BinaryOp::Eq, _, right) => {
                    assert!(matches!(right.kind, ExprKind::Binary(BinaryOp::Div, _, _)));
                }
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn coalesces_consecutive_wheres() {
        let q = parsed("T | where a == 1 | where b == 2 | project a, b");
        let merged = coalesce_predicates(q);
        assert_eq!(merged.pipeline.len(), 2);
        assert!(matches!(merged.pipeline[0].kind, OperationKind::Where(_)));
    }

    #[test]
    fn does_not_coalesce_across_summarize() {
        let q = parsed("T | where a == 1 | summarize count() | where b == 2");
        let merged = coalesce_predicates(q);
        assert_eq!(merged.pipeline.len(), 3);
    }

    #[test]
    fn pushes_safe_project_above_where() {
        let q = parsed("T | where a > 1 | project a, b");
        let pushed = pushdown_projection(q);
        assert!(matches!(pushed.pipeline[0].kind, OperationKind::Project(_)));
        assert!(matches!(pushed.pipeline[1].kind, OperationKind::Where(_)));
    }

    #[test]
    fn does_not_push_when_column_dropped() {
        let q = parsed("T | where a > 1 | project b");
        let pushed = pushdown_projection(q);
        assert!(matches!(pushed.pipeline[0].kind, OperationKind::Where(_)));
    }

    #[test]
    fn leaves_project_where_pair_for_pushdown_projection_to_own() {
        let q = parsed("T | project a | where a > 1");
        let reordered = reorder_by_cost(q);
        assert!(matches!(reordered.pipeline[0].kind, OperationKind::Project(_)));
        assert!(matches!(reordered.pipeline[1].kind, OperationKind::Where(_)));
    }

    #[test]
    fn where_migrates_across_an_extend_it_does_not_depend_on() {
        let q = parsed("T | extend c = a + 1 | where a > 1");
        let reordered = reorder_by_cost(q);
        assert!(matches!(reordered.pipeline[0].kind, OperationKind::Where(_)));
        assert!(matches!(reordered.pipeline[1].kind, OperationKind::Extend(_)));
    }

    #[test]
    fn where_does_not_cross_the_extend_it_reads() {
        let q = parsed("T | extend c = a + 1 | where c > 1");
        let reordered = reorder_by_cost(q);
        assert!(matches!(reordered.pipeline[0].kind, OperationKind::Extend(_)));
        assert!(matches!(reordered.pipeline[1].kind, OperationKind::Where(_)));
    }

    #[test]
    fn top_migrates_across_a_project_that_keeps_its_sort_key() {
        let q = parsed("T | top 5 by a | project a");
        let reordered = reorder_by_cost(q);
        assert!(matches!(reordered.pipeline[0].kind, OperationKind::Project(_)));
        assert!(matches!(reordered.pipeline[1].kind, OperationKind::Top { .. }));
    }

    #[test]
    fn top_does_not_cross_a_project_that_drops_its_sort_key() {
        let q = parsed("T | top 5 by b | project a");
        let reordered = reorder_by_cost(q);
        assert!(matches!(reordered.pipeline[0].kind, OperationKind::Top { .. }));
        assert!(matches!(reordered.pipeline[1].kind, OperationKind::Project(_)));
    }

    #[test]
    fn join_then_summarize_keeps_its_relative_order() {
        let q = parsed("T | join U on T.id==U.id | summarize count()");
        let reordered = reorder_by_cost(q);
        assert!(matches!(reordered.pipeline[0].kind, OperationKind::Join { .. }));
        assert!(matches!(reordered.pipeline[1].kind, OperationKind::Summarize { .. }));
    }

    #[test]
    fn extend_then_project_is_left_untouched() {
        let q = parsed("Users | extend doubled = age * 2 | project doubled");
        let reordered = reorder_by_cost(q);
        assert!(matches!(reordered.pipeline[0].kind, OperationKind::Extend(_)));
        assert!(matches!(reordered.pipeline[1].kind, OperationKind::Project(_)));
    }

    #[test]
    fn drops_unused_extend_column() {
        let q = parsed("T | extend unused = a + 1, used = b * 2 | project used");
        let trimmed = eliminate_dead_extends(q);
        match &trimmed.pipeline[0].kind {
            OperationKind::Extend(assigns) => {
                assert_eq!(assigns.len(), 1);
                assert_eq!(assigns[0].name, "used");
            }
            _ => panic!(),
        }
    }

    #[test]
    fn keeps_extend_column_surfaced_as_final_stage() {
        let q = parsed("T | extend computed = a + 1");
        let trimmed = eliminate_dead_extends(q);
        assert_eq!(trimmed.pipeline.len(), 1);
    }
}
