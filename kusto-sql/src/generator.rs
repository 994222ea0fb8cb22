//! Translates an optimized [`Query`] into a parameterized SQL string plus a
//! positional parameter vector, per the leaf-wrap-then-subquery-wrap shape:
//! the leaf table reference becomes `(SELECT * FROM <table> WHERE tenant =
//! $1) base`, and every subsequent pipeline operation wraps the running SQL
//! as a further `base` subquery. Tenant is always the first bound parameter.

use kusto_core::{SqlGenError, Value};
use kusto_lang::{
    Agg, BinaryOp, Expr, ExprKind, JoinKind, OperationKind, OrderItem, ProjCol, Query, SortDir,
    UnaryOp,
};

pub type SqlResult<T> = Result<T, SqlGenError>;

/// Values the generator needs beyond the AST itself: the tenant the query
/// is scoped to, an optional time range, and an optional row cap — all
/// appended as outer parameters per the SQL-generation rules.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub tenant: String,
    pub time_range: Option<(Value, Value)>,
    pub row_limit: Option<u64>,
}

struct Generator {
    params: Vec<Value>,
}

impl Generator {
    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

pub fn emit_sql(query: &Query, ctx: &ExecutionContext) -> SqlResult<(String, Vec<Value>)> {
    let mut gen = Generator { params: Vec::new() };
    let tenant_param = gen.bind(Value::String(ctx.tenant.clone()));

    let mut core = format!(
        "SELECT * FROM {} WHERE tenant = {}",
        escape_ident(&query.table.name),
        tenant_param
    );

    for op in &query.pipeline {
        let from = wrap_as_subquery(&core);
        core = emit_operation(&mut gen, &op.kind, &from, &tenant_param)?;
    }

    if let Some((start, end)) = &ctx.time_range {
        let start_p = gen.bind(start.clone());
        let end_p = gen.bind(end.clone());
        let from = wrap_as_subquery(&core);
        core = format!(
            "SELECT * FROM {from} WHERE timestamp BETWEEN {start_p} AND {end_p}"
        );
    }

    if let Some(limit) = ctx.row_limit {
        let limit_p = gen.bind(Value::Integer(limit as i64));
        core = format!("{core} LIMIT {limit_p}");
    }

    Ok((core, gen.params))
}

fn wrap_as_subquery(core: &str) -> String {
    format!("({core}) base")
}

fn emit_operation(
    gen: &mut Generator,
    kind: &OperationKind,
    from: &str,
    tenant_param: &str,
) -> SqlResult<String> {
    match kind {
        OperationKind::Where(expr) => {
            let cond = emit_expr(gen, expr)?;
            Ok(format!("SELECT * FROM {from} WHERE ({cond})"))
        }
        OperationKind::Project(cols) => {
            let cols = emit_proj_cols(gen, cols)?;
            Ok(format!("SELECT {cols} FROM {from}"))
        }
        OperationKind::Extend(assigns) => {
            let mut parts = vec!["*".to_string()];
            for assign in assigns {
                let value = emit_expr(gen, &assign.expr)?;
                parts.push(format!("{value} AS {}", escape_ident(&assign.name)));
            }
            Ok(format!("SELECT {} FROM {from}", parts.join(", ")))
        }
        OperationKind::Summarize { aggs, group_by } => {
            let mut select_parts = Vec::new();
            if let Some(group_by) = group_by {
                for expr in group_by {
                    select_parts.push(emit_expr(gen, expr)?);
                }
            }
            for agg in aggs {
                select_parts.push(emit_agg(gen, agg)?);
            }
            let mut sql = format!("SELECT {} FROM {from}", select_parts.join(", "));
            if let Some(group_by) = group_by {
                if !group_by.is_empty() {
                    let keys = group_by
                        .iter()
                        .map(|e| emit_expr(gen, e))
                        .collect::<SqlResult<Vec<_>>>()?;
                    sql.push_str(" GROUP BY ");
                    sql.push_str(&keys.join(", "));
                }
            }
            Ok(sql)
        }
        OperationKind::Order(items) => {
            let order = emit_order_items(gen, items)?;
            Ok(format!("SELECT * FROM {from} ORDER BY {order}"))
        }
        OperationKind::Top { n, by } => {
            let n_sql = emit_expr(gen, n)?;
            let mut sql = format!("SELECT * FROM {from}");
            if let Some(by) = by {
                sql.push_str(" ORDER BY ");
                sql.push_str(&emit_order_items(gen, by)?);
            }
            sql.push_str(&format!(" LIMIT {n_sql}"));
            Ok(sql)
        }
        OperationKind::Limit(expr) => {
            let n_sql = emit_expr(gen, expr)?;
            Ok(format!("SELECT * FROM {from} LIMIT {n_sql}"))
        }
        OperationKind::Distinct(cols) => match cols {
            Some(cols) => {
                let exprs = cols
                    .iter()
                    .map(|e| emit_expr(gen, e))
                    .collect::<SqlResult<Vec<_>>>()?;
                Ok(format!("SELECT DISTINCT {} FROM {from}", exprs.join(", ")))
            }
            None => Ok(format!("SELECT DISTINCT * FROM {from}")),
        },
        OperationKind::Join { kind, table, on } => {
            let joined = format!(
                "(SELECT * FROM {} WHERE tenant = {}) joined",
                escape_ident(&table.name),
                tenant_param
            );
            let on_sql = emit_expr(gen, on)?;
            Ok(format!(
                "SELECT * FROM {from} {} JOIN {joined} ON {on_sql}",
                join_keyword(*kind)
            ))
        }
        OperationKind::Union(tables) => {
            let mut parts = vec![format!("SELECT * FROM {from}")];
            for table in tables {
                parts.push(format!(
                    "SELECT * FROM {} WHERE tenant = {}",
                    escape_ident(&table.name),
                    tenant_param
                ));
            }
            Ok(parts.join(" UNION ALL "))
        }
    }
}

fn join_keyword(kind: JoinKind) -> &'static str {
    match kind {
        JoinKind::Inner => "INNER",
        JoinKind::Left => "LEFT",
        JoinKind::Right => "RIGHT",
        JoinKind::Full => "FULL",
    }
}

fn emit_proj_cols(gen: &mut Generator, cols: &[ProjCol]) -> SqlResult<String> {
    let mut parts = Vec::with_capacity(cols.len());
    for col in cols {
        let value = emit_expr(gen, &col.expr)?;
        match &col.alias {
            Some(alias) => parts.push(format!("{value} AS {}", escape_ident(alias))),
            None => parts.push(value),
        }
    }
    Ok(parts.join(", "))
}

fn emit_order_items(gen: &mut Generator, items: &[OrderItem]) -> SqlResult<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let value = emit_expr(gen, &item.expr)?;
        let dir = match item.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };
        parts.push(format!("{value} {dir}"));
    }
    Ok(parts.join(", "))
}

fn emit_agg(gen: &mut Generator, agg: &Agg) -> SqlResult<String> {
    let arg_sql = match &agg.arg {
        Some(expr) => emit_expr(gen, expr)?,
        None => "*".to_string(),
    };
    let name = agg.func.to_lowercase();
    let expr_sql = match name.as_str() {
        "count" => format!("COUNT({arg_sql})"),
        "sum" => format!("SUM({arg_sql})"),
        "avg" => format!("AVG({arg_sql})"),
        "min" => format!("MIN({arg_sql})"),
        "max" => format!("MAX({arg_sql})"),
        "dcount" => format!("COUNT(DISTINCT {arg_sql})"),
        other => {
            return Err(SqlGenError::UnsupportedFunction {
                name: other.to_string(),
            })
        }
    };
    match &agg.alias {
        Some(alias) => Ok(format!("{expr_sql} AS {}", escape_ident(alias))),
        None => Ok(expr_sql),
    }
}

fn emit_expr(gen: &mut Generator, expr: &Expr) -> SqlResult<String> {
    match &expr.kind {
        ExprKind::Literal(value, _) => Ok(gen.bind(value.clone())),
        ExprKind::Identifier(name, _) => Ok(escape_ident(name)),
        ExprKind::Member(base, name, computed) => {
            let base_sql = emit_expr(gen, base)?;
            if *computed {
                Ok(format!("{base_sql}->>'{}'", name.replace('\'', "''")))
            } else {
                Ok(format!("{base_sql}.{}", escape_ident(name)))
            }
        }
        ExprKind::Unary(op, operand) => {
            let operand_sql = emit_expr(gen, operand)?;
            match op {
                UnaryOp::Not => Ok(format!("NOT ({operand_sql})")),
                UnaryOp::Neg => Ok(format!("-({operand_sql})")),
                UnaryOp::Pos => Ok(operand_sql),
            }
        }
        ExprKind::Binary(op, left, right) => emit_binary(gen, *op, left, right),
        ExprKind::Call(name, args) => {
            let arg_sql = args
                .iter()
                .map(|a| emit_expr(gen, a))
                .collect::<SqlResult<Vec<_>>>()?;
            Ok(format!("{}({})", name.to_lowercase(), arg_sql.join(", ")))
        }
        ExprKind::Case(arms, else_branch) => {
            let mut sql = "CASE".to_string();
            for (when, then) in arms {
                let when_sql = emit_expr(gen, when)?;
                let then_sql = emit_expr(gen, then)?;
                sql.push_str(&format!(" WHEN {when_sql} THEN {then_sql}"));
            }
            if let Some(else_expr) = else_branch {
                sql.push_str(&format!(" ELSE {}", emit_expr(gen, else_expr)?));
            }
            sql.push_str(" END");
            Ok(sql)
        }
        ExprKind::Array(items) => {
            let parts = items
                .iter()
                .map(|e| emit_expr(gen, e))
                .collect::<SqlResult<Vec<_>>>()?;
            Ok(format!("({})", parts.join(", ")))
        }
    }
}

fn emit_binary(gen: &mut Generator, op: BinaryOp, left: &Expr, right: &Expr) -> SqlResult<String> {
    match op {
        BinaryOp::Or => Ok(format!(
            "{} OR {}",
            emit_expr(gen, left)?,
            emit_expr(gen, right)?
        )),
        BinaryOp::And => Ok(format!(
            "{} AND {}",
            emit_expr(gen, left)?,
            emit_expr(gen, right)?
        )),
        BinaryOp::Eq => binop(gen, left, right, "="),
        BinaryOp::Ne => binop(gen, left, right, "!="),
        BinaryOp::Lt => binop(gen, left, right, "<"),
        BinaryOp::Le => binop(gen, left, right, "<="),
        BinaryOp::Gt => binop(gen, left, right, ">"),
        BinaryOp::Ge => binop(gen, left, right, ">="),
        BinaryOp::Add => binop(gen, left, right, "+"),
        BinaryOp::Sub => binop(gen, left, right, "-"),
        BinaryOp::Mul => binop(gen, left, right, "*"),
        BinaryOp::Div => binop(gen, left, right, "/"),
        BinaryOp::Mod => binop(gen, left, right, "%"),
        BinaryOp::In => {
            let left_sql = emit_expr(gen, left)?;
            let right_sql = emit_expr(gen, right)?;
            Ok(format!("{left_sql} IN {right_sql}"))
        }
        BinaryOp::NotIn => {
            let left_sql = emit_expr(gen, left)?;
            let right_sql = emit_expr(gen, right)?;
            Ok(format!("{left_sql} NOT IN {right_sql}"))
        }
        BinaryOp::Between => {
            let left_sql = emit_expr(gen, left)?;
            let (low, high) = match &right.kind {
                ExprKind::Array(items) if items.len() == 2 => {
                    (emit_expr(gen, &items[0])?, emit_expr(gen, &items[1])?)
                }
                _ => {
                    return Err(SqlGenError::UnsupportedConstruct(
                        "between requires a two-element range".to_string(),
                    ))
                }
            };
            Ok(format!("{left_sql} BETWEEN {low} AND {high}"))
        }
        BinaryOp::Contains => like_expr(gen, left, right, "%{}%")
            .map(|(col, pat)| format!("{col} ILIKE {pat}")),
        BinaryOp::NotContains => like_expr(gen, left, right, "%{}%")
            .map(|(col, pat)| format!("{col} NOT ILIKE {pat}")),
        BinaryOp::StartsWith => like_expr(gen, left, right, "{}%")
            .map(|(col, pat)| format!("{col} ILIKE {pat}")),
        BinaryOp::EndsWith => like_expr(gen, left, right, "%{}")
            .map(|(col, pat)| format!("{col} ILIKE {pat}")),
        BinaryOp::Matches => binop(gen, left, right, "~*"),
        BinaryOp::Like => binop(gen, left, right, "ILIKE"),
    }
}

fn binop(gen: &mut Generator, left: &Expr, right: &Expr, sql_op: &str) -> SqlResult<String> {
    Ok(format!(
        "{} {sql_op} {}",
        emit_expr(gen, left)?,
        emit_expr(gen, right)?
    ))
}

/// Builds a `col ILIKE ('%' || $n || '%')`-shaped expression so the search
/// text stays a bound parameter rather than being baked into SQL text with
/// wildcards spliced in.
fn like_expr(
    gen: &mut Generator,
    left: &Expr,
    right: &Expr,
    pattern: &str,
) -> SqlResult<(String, String)> {
    let col = emit_expr(gen, left)?;
    let param = emit_expr(gen, right)?;
    let wrapped = match pattern {
        "%{}%" => format!("('%' || {param} || '%')"),
        "{}%" => format!("({param} || '%')"),
        "%{}" => format!("('%' || {param})"),
        _ => param,
    };
    Ok((col, wrapped))
}

fn escape_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kusto_lang::parse;

    fn ctx(tenant: &str) -> ExecutionContext {
        ExecutionContext {
            tenant: tenant.to_string(),
            time_range: None,
            row_limit: None,
        }
    }

    #[test]
    fn matches_spec_concrete_example() {
        let (ast, diags) = parse("Users | where age > 18 | project name");
        assert!(diags.is_empty(), "{diags:?}");
        let (sql, params) = emit_sql(&ast.unwrap(), &ctx("T0")).unwrap();
        assert_eq!(
            sql,
            r#"SELECT "name" FROM (SELECT * FROM (SELECT * FROM "Users" WHERE tenant = $1) base WHERE ("age" > $2)) base"#
        );
        assert_eq!(params, vec![Value::String("T0".to_string()), Value::Integer(18)]);
    }

    #[test]
    fn tenant_is_always_the_first_bound_parameter() {
        let (ast, _) = parse("T | where a == 1");
        let (_, params) = emit_sql(&ast.unwrap(), &ctx("acme")).unwrap();
        assert_eq!(params[0], Value::String("acme".to_string()));
    }

    #[test]
    fn dcount_maps_to_count_distinct() {
        let (ast, _) = parse("T | summarize dcount(user_id)");
        let (sql, _) = emit_sql(&ast.unwrap(), &ctx("T0")).unwrap();
        assert!(sql.contains("COUNT(DISTINCT"));
    }

    #[test]
    fn unknown_aggregate_is_unsupported() {
        let (ast, _) = parse("T | summarize weirdfn(x)");
        let err = emit_sql(&ast.unwrap(), &ctx("T0")).unwrap_err();
        assert!(matches!(err, SqlGenError::UnsupportedFunction { .. }));
    }

    #[test]
    fn identifier_quotes_are_doubled() {
        let ident = escape_ident(r#"weird"name"#);
        assert_eq!(ident, r#""weird""name""#);
    }

    #[test]
    fn time_range_and_limit_are_appended_outermost() {
        let (ast, _) = parse("T | where a == 1");
        let context = ExecutionContext {
            tenant: "T0".to_string(),
            time_range: Some((
                Value::Datetime("2026-01-01T00:00:00Z".to_string()),
                Value::Datetime("2026-02-01T00:00:00Z".to_string()),
            )),
            row_limit: Some(100),
        };
        let (sql, params) = emit_sql(&ast.unwrap(), &context).unwrap();
        assert!(sql.contains("BETWEEN"));
        assert!(sql.ends_with("LIMIT $5"));
        assert_eq!(params.len(), 5);
    }
}
