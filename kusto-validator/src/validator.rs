//! Resolves identifiers and function calls in a parsed [`Query`] against an
//! injected [`SchemaProvider`]. Purely additive: every check appends a
//! [`Diagnostic`] and the AST is returned untouched, mirroring
//! `caliber-dsl::compiler`'s two-pass "register names, then cross-reference"
//! shape adapted here to schema/function-catalog resolution instead of
//! cross-references between DSL definitions.

use crate::schema::{FunctionClass, SchemaProvider};
use kusto_core::{DataType, Diagnostic, ValidationError};
use kusto_lang::{Agg, Expr, ExprKind, Operation, OperationKind, OrderItem, ProjCol, Query};
use std::collections::HashSet;

/// Tracks which column names are in scope at the current point in the
/// pipeline, per the column-availability rules in the operation design
/// notes (Project/Extend introduce columns, Summarize replaces the set).
struct Scope {
    columns: HashSet<String>,
}

impl Scope {
    fn from_table_columns(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            columns: names.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.columns.contains(&name.to_lowercase())
    }

    fn insert(&mut self, name: &str) {
        self.columns.insert(name.to_lowercase());
    }

    fn replace_with(&mut self, names: impl IntoIterator<Item = String>) {
        self.columns = names.into_iter().map(|s| s.to_lowercase()).collect();
    }
}

pub fn validate(query: &Query, schema: &dyn SchemaProvider) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    let mut scope = match schema.get_table(&query.table.name) {
        Some(table) => Scope::from_table_columns(table.columns.iter().map(|c| c.name.clone())),
        None => {
            diags.push(
                ValidationError::UnknownTable {
                    name: query.table.name.clone(),
                }
                .into_diagnostic(),
            );
            Scope::from_table_columns(std::iter::empty())
        }
    };

    for stmt in &query.lets {
        validate_expr(&stmt.expr, &scope, schema, &mut diags);
        scope.insert(&stmt.name);
    }

    for op in &query.pipeline {
        validate_operation(op, &mut scope, schema, &mut diags);
    }

    diags
}

fn validate_operation(
    op: &Operation,
    scope: &mut Scope,
    schema: &dyn SchemaProvider,
    diags: &mut Vec<Diagnostic>,
) {
    match &op.kind {
        OperationKind::Where(expr) => validate_expr(expr, scope, schema, diags),
        OperationKind::Project(cols) => {
            for col in cols {
                validate_expr(&col.expr, scope, schema, diags);
            }
            scope.replace_with(cols.iter().map(|c| proj_col_name(c)));
        }
        OperationKind::Extend(assigns) => {
            for assign in assigns {
                validate_expr(&assign.expr, scope, schema, diags);
            }
            for assign in assigns {
                scope.insert(&assign.name);
            }
        }
        OperationKind::Summarize { aggs, group_by } => {
            for agg in aggs {
                validate_agg(agg, scope, schema, diags);
            }
            if let Some(group_by) = group_by {
                for expr in group_by {
                    validate_expr(expr, scope, schema, diags);
                }
            }
            let mut names: Vec<String> = aggs.iter().map(|a| agg_result_name(a)).collect();
            if let Some(group_by) = group_by {
                names.extend(group_by.iter().filter_map(expr_as_identifier));
            }
            scope.replace_with(names);
        }
        OperationKind::Order(items) => validate_order_items(items, scope, schema, diags),
        OperationKind::Top { n, by } => {
            validate_expr(n, scope, schema, diags);
            if let Some(by) = by {
                validate_order_items(by, scope, schema, diags);
            }
        }
        OperationKind::Limit(expr) => validate_expr(expr, scope, schema, diags),
        OperationKind::Distinct(cols) => {
            if let Some(cols) = cols {
                for expr in cols {
                    validate_expr(expr, scope, schema, diags);
                }
            }
        }
        OperationKind::Join { table, on, .. } => {
            if let Some(joined) = schema.get_table(&table.name) {
                for col in &joined.columns {
                    scope.insert(&col.name);
                }
            } else {
                diags.push(
                    ValidationError::UnknownTable {
                        name: table.name.clone(),
                    }
                    .into_diagnostic(),
                );
            }
            validate_expr(on, scope, schema, diags);
        }
        OperationKind::Union(tables) => {
            for table in tables {
                if schema.get_table(&table.name).is_none() {
                    diags.push(
                        ValidationError::UnknownTable {
                            name: table.name.clone(),
                        }
                        .into_diagnostic(),
                    );
                }
            }
        }
    }
}

fn validate_order_items(
    items: &[OrderItem],
    scope: &Scope,
    schema: &dyn SchemaProvider,
    diags: &mut Vec<Diagnostic>,
) {
    for item in items {
        validate_expr(&item.expr, scope, schema, diags);
    }
}

fn validate_agg(
    agg: &Agg,
    scope: &Scope,
    schema: &dyn SchemaProvider,
    diags: &mut Vec<Diagnostic>,
) {
    if let Some(arg) = &agg.arg {
        validate_expr(arg, scope, schema, diags);
    }
    match schema.get_function(&agg.func) {
        None => diags.push(
            ValidationError::UnknownFunction {
                name: agg.func.clone(),
            }
            .into_diagnostic(),
        ),
        Some(sig) => {
            let got_arity = if agg.arg.is_some() { 1 } else { 0 };
            if let Some(expected) = sig.arity {
                if expected != got_arity {
                    diags.push(
                        ValidationError::ArityMismatch {
                            name: agg.func.clone(),
                            expected,
                            got: got_arity,
                        }
                        .into_diagnostic(),
                    );
                }
            }
        }
    }
}

fn validate_expr(
    expr: &Expr,
    scope: &Scope,
    schema: &dyn SchemaProvider,
    diags: &mut Vec<Diagnostic>,
) {
    match &expr.kind {
        ExprKind::Literal(_, _) => {}
        ExprKind::Identifier(name, _) => {
            if !scope.contains(name) {
                diags.push(
                    ValidationError::UnknownColumn { name: name.clone() }.into_diagnostic(),
                );
            }
        }
        ExprKind::Member(obj, _, _) => validate_expr(obj, scope, schema, diags),
        ExprKind::Unary(_, operand) => validate_expr(operand, scope, schema, diags),
        ExprKind::Binary(_, left, right) => {
            validate_expr(left, scope, schema, diags);
            validate_expr(right, scope, schema, diags);
        }
        ExprKind::Call(name, args) => {
            for arg in args {
                validate_expr(arg, scope, schema, diags);
            }
            validate_call(name, args, schema, diags);
        }
        ExprKind::Case(arms, else_branch) => {
            for (when, then) in arms {
                validate_expr(when, scope, schema, diags);
                validate_expr(then, scope, schema, diags);
            }
            if let Some(else_expr) = else_branch {
                validate_expr(else_expr, scope, schema, diags);
            }
        }
        ExprKind::Array(items) => {
            for item in items {
                validate_expr(item, scope, schema, diags);
            }
        }
    }
}

fn validate_call(
    name: &str,
    args: &[Expr],
    schema: &dyn SchemaProvider,
    diags: &mut Vec<Diagnostic>,
) {
    let Some(sig) = schema.get_function(name) else {
        diags.push(ValidationError::UnknownFunction { name: name.to_string() }.into_diagnostic());
        return;
    };

    if sig.class == FunctionClass::Aggregate {
        diags.push(
            ValidationError::AggregateOutsideSummarize {
                name: name.to_string(),
            }
            .into_diagnostic(),
        );
    }

    if let Some(expected) = sig.arity {
        if expected != args.len() {
            diags.push(
                ValidationError::ArityMismatch {
                    name: name.to_string(),
                    expected,
                    got: args.len(),
                }
                .into_diagnostic(),
            );
            return;
        }
    }

    for (index, (arg, expected)) in args.iter().zip(sig.arg_types.iter()).enumerate() {
        if let Some((_, got)) = arg.as_literal() {
            if got != *expected && *expected != DataType::Null && got != DataType::Null {
                diags.push(
                    ValidationError::TypeMismatch {
                        name: name.to_string(),
                        index,
                        expected: *expected,
                        got,
                    }
                    .into_diagnostic(),
                );
            }
        }
    }
}

fn proj_col_name(col: &ProjCol) -> String {
    col.alias
        .clone()
        .or_else(|| expr_as_identifier(&col.expr))
        .unwrap_or_else(|| "column".to_string())
}

fn agg_result_name(agg: &Agg) -> String {
    agg.alias.clone().unwrap_or_else(|| agg.func.clone())
}

fn expr_as_identifier(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Identifier(name, _) => Some(name.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, FunctionSig, OperatorSig, TableSchema};
    use kusto_core::DataType;

    struct FixtureSchema;

    impl SchemaProvider for FixtureSchema {
        fn get_table(&self, name: &str) -> Option<TableSchema> {
            if name.eq_ignore_ascii_case("Users") {
                Some(TableSchema {
                    name: "Users".to_string(),
                    columns: vec![
                        ColumnSchema {
                            name: "age".to_string(),
                            data_type: DataType::Integer,
                        },
                        ColumnSchema {
                            name: "name".to_string(),
                            data_type: DataType::String,
                        },
                    ],
                    estimated_row_count: Some(1_000_000),
                })
            } else {
                None
            }
        }

        fn get_functions(&self) -> Vec<FunctionSig> {
            vec![
                FunctionSig {
                    name: "count".to_string(),
                    class: FunctionClass::Aggregate,
                    arity: Some(0),
                    arg_types: vec![],
                    return_type: DataType::Integer,
                },
                FunctionSig {
                    name: "strlen".to_string(),
                    class: FunctionClass::Scalar,
                    arity: Some(1),
                    arg_types: vec![DataType::String],
                    return_type: DataType::Integer,
                },
            ]
        }

        fn get_operators(&self) -> Vec<OperatorSig> {
            vec![]
        }
    }

    fn query(src: &str) -> Query {
        let (ast, diags) = kusto_lang::parse(src);
        assert!(diags.is_empty(), "{diags:?}");
        ast.unwrap()
    }

    #[test]
    fn unknown_table_is_flagged() {
        let q = query("Ghosts | where x > 1");
        let diags = validate(&q, &FixtureSchema);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn known_columns_resolve() {
        let q = query("Users | where age > 18 | project name");
        let diags = validate(&q, &FixtureSchema);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn unknown_column_is_flagged() {
        let q = query("Users | where bogus > 1");
        let diags = validate(&q, &FixtureSchema);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn extend_introduces_column_for_downstream_use() {
        let q = query("Users | extend doubled = age * 2 | project doubled");
        let diags = validate(&q, &FixtureSchema);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn summarize_replaces_available_columns() {
        let q = query("Users | summarize total = count() by name | where total > 0");
        let diags = validate(&q, &FixtureSchema);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn aggregate_outside_summarize_is_flagged() {
        let q = query("Users | where count() > 0");
        let diags = validate(&q, &FixtureSchema);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn scalar_function_arity_mismatch_is_flagged() {
        let q = query("Users | where strlen(name, age) > 0");
        let diags = validate(&q, &FixtureSchema);
        assert_eq!(diags.len(), 1);
    }
}
