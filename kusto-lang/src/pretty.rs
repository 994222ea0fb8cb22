//! Deterministic pretty-printer. Re-tokenizing and re-parsing the text
//! produced here for any parsed query must yield an AST equal to the
//! original modulo spans — the property exercised in `prop_tests` below —
//! following the round-trip shape of `caliber-dsl::parser::pretty_print`.

use crate::ast::*;
use std::fmt::Write as _;

pub fn pretty_print(query: &Query) -> String {
    let mut out = String::new();
    for stmt in &query.lets {
        let _ = writeln!(out, "let {} = {};", stmt.name, print_expr(&stmt.expr));
    }
    let _ = write!(out, "{}", print_table_ref(&query.table));
    for op in &query.pipeline {
        let _ = write!(out, "\n| {}", print_operation(&op.kind));
    }
    out
}

fn print_table_ref(table: &TableRef) -> String {
    match &table.alias {
        Some(alias) => format!("{} {}", table.name, alias),
        None => table.name.clone(),
    }
}

fn print_operation(kind: &OperationKind) -> String {
    match kind {
        OperationKind::Where(expr) => format!("where {}", print_expr(expr)),
        OperationKind::Project(cols) => format!("project {}", join(cols, print_proj_col)),
        OperationKind::Extend(assigns) => format!("extend {}", join(assigns, print_assign)),
        OperationKind::Summarize { aggs, group_by } => {
            let mut s = format!("summarize {}", join(aggs, print_agg));
            if let Some(gb) = group_by {
                let _ = write!(s, " by {}", join(gb, print_expr));
            }
            s
        }
        OperationKind::Order(items) => format!("order by {}", join(items, print_order_item)),
        OperationKind::Top { n, by } => {
            let mut s = format!("top {}", print_expr(n));
            if let Some(by) = by {
                let _ = write!(s, " by {}", join(by, print_order_item));
            }
            s
        }
        OperationKind::Limit(n) => format!("limit {}", print_expr(n)),
        OperationKind::Distinct(cols) => match cols {
            Some(cols) => format!("distinct {}", join(cols, print_expr)),
            None => "distinct".to_string(),
        },
        OperationKind::Join { kind, table, on } => {
            format!(
                "join {}{} on {}",
                print_join_kind(*kind),
                print_table_ref(table),
                print_expr(on)
            )
        }
        OperationKind::Union(tables) => format!("union {}", join(tables, print_table_ref)),
    }
}

fn print_join_kind(kind: JoinKind) -> &'static str {
    match kind {
        JoinKind::Inner => "",
        JoinKind::Left => "left ",
        JoinKind::Right => "right ",
        JoinKind::Full => "full ",
    }
}

fn print_proj_col(col: &ProjCol) -> String {
    match &col.alias {
        Some(alias) => format!("{} as {}", print_expr(&col.expr), alias),
        None => print_expr(&col.expr),
    }
}

fn print_assign(assign: &Assign) -> String {
    format!("{} = {}", assign.name, print_expr(&assign.expr))
}

fn print_agg(agg: &Agg) -> String {
    let arg = agg.arg.as_ref().map(print_expr).unwrap_or_default();
    let base = format!("{}({})", agg.func, arg);
    match &agg.alias {
        Some(alias) => format!("{} as {}", base, alias),
        None => base,
    }
}

fn print_order_item(item: &OrderItem) -> String {
    let dir = match item.dir {
        SortDir::Asc => "asc",
        SortDir::Desc => "desc",
    };
    format!("{} {}", print_expr(&item.expr), dir)
}

pub fn print_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(value, _) => print_literal(value),
        ExprKind::Identifier(name, quoted) => {
            if *quoted {
                format!("`{name}`")
            } else {
                name.clone()
            }
        }
        ExprKind::Member(base, name, computed) => {
            if *computed {
                format!("{}[\"{}\"]", print_expr(base), escape_string(name))
            } else {
                format!("{}.{}", print_expr(base), name)
            }
        }
        ExprKind::Unary(op, operand) => match op {
            UnaryOp::Not => format!("not {}", print_expr(operand)),
            UnaryOp::Neg => format!("-{}", print_expr(operand)),
            UnaryOp::Pos => format!("+{}", print_expr(operand)),
        },
        ExprKind::Binary(op, left, right) => {
            format!("{} {} {}", print_expr(left), print_binary_op(*op), print_expr(right))
        }
        ExprKind::Call(name, args) => format!("{}({})", name, join(args, print_expr)),
        ExprKind::Case(arms, else_branch) => {
            let mut s = "case".to_string();
            for (when, then) in arms {
                let _ = write!(s, " when {} then {}", print_expr(when), print_expr(then));
            }
            if let Some(else_expr) = else_branch {
                let _ = write!(s, " else {}", print_expr(else_expr));
            }
            s.push_str(" end");
            s
        }
        ExprKind::Array(items) => format!("({})", join(items, print_expr)),
    }
}

fn print_binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "or",
        BinaryOp::And => "and",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::In => "in",
        BinaryOp::NotIn => "!in",
        BinaryOp::Between => "between",
        BinaryOp::Contains => "contains",
        BinaryOp::NotContains => "!contains",
        BinaryOp::StartsWith => "startswith",
        BinaryOp::EndsWith => "endswith",
        BinaryOp::Matches => "matches",
        BinaryOp::Like => "like",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
    }
}

fn print_literal(value: &kusto_core::Value) -> String {
    match value {
        kusto_core::Value::String(s) => format!("\"{}\"", escape_string(s)),
        kusto_core::Value::Integer(i) => i.to_string(),
        kusto_core::Value::Float(f) => f.to_string(),
        kusto_core::Value::Boolean(b) => b.to_string(),
        kusto_core::Value::Null => "null".to_string(),
        kusto_core::Value::Timespan(ns) => format!("{ns}ns"),
        kusto_core::Value::Datetime(dt) => format!("datetime({dt})"),
        kusto_core::Value::Guid(g) => g.clone(),
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn join<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    items.iter().map(f).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn roundtrip(src: &str) -> Query {
        let (ast, diags) = parse(src);
        assert!(diags.is_empty(), "{diags:?}");
        let ast = ast.unwrap();
        let printed = pretty_print(&ast);
        let (reparsed, diags2) = parse(&printed);
        assert!(diags2.is_empty(), "reparse failed: {diags2:?}\nprinted: {printed}");
        reparsed.unwrap()
    }

    #[test]
    fn roundtrips_simple_filter() {
        let ast = roundtrip("Users | where age > 18 | project name");
        assert_eq!(ast.table.name, "Users");
    }

    #[test]
    fn roundtrips_summarize_and_order() {
        roundtrip("T | summarize total = sum(x) by category | order by total desc");
    }

    #[test]
    fn roundtrips_join() {
        roundtrip("T | join left U on T.id == U.id");
    }

    #[test]
    fn roundtrips_case_expression() {
        roundtrip("T | extend y = case when x > 0 then 1 else 0 end");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::parser::parse;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_roundtrip_is_stable_under_a_second_pass(
            table in "[A-Z][a-zA-Z0-9]{0,8}",
            col in "[a-z][a-z0-9_]{0,6}",
            n in 0i64..1000,
        ) {
            let src = format!("{table} | where {col} > {n} | project {col}");
            let (ast, diags) = parse(&src);
            prop_assert!(diags.is_empty());
            let once = pretty_print(&ast.unwrap());
            let (reparsed, diags2) = parse(&once);
            prop_assert!(diags2.is_empty());
            let twice = pretty_print(&reparsed.unwrap());
            prop_assert_eq!(once, twice);
        }
    }
}
