//! Abstract syntax tree for pipelined KQL queries.
//!
//! Plain `enum`+`struct` nodes with `Box`-linked children, following
//! `caliber-dsl::parser::ast`'s style rather than an arena crate. Every node
//! carries a source [`Span`]; the Query exclusively owns its subtree and
//! subtrees are never shared. Binary-expression precedence is established
//! exclusively by the parser's grammar — this tree carries no precedence
//! metadata.

use crate::token::Span;
use kusto_core::{DataType, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetStatement {
    pub name: String,
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub lets: Vec<LetStatement>,
    pub table: TableRef,
    pub pipeline: Vec<Operation>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjCol {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agg {
    pub func: String,
    pub arg: Option<Expr>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: Expr,
    pub dir: SortDir,
}

/// One pipeline stage. Each operation's relative position in `Query::pipeline`
/// is meaningful: the first pipeline entry follows directly after the table
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationKind {
    Where(Expr),
    Project(Vec<ProjCol>),
    Extend(Vec<Assign>),
    Summarize {
        aggs: Vec<Agg>,
        group_by: Option<Vec<Expr>>,
    },
    Order(Vec<OrderItem>),
    Top {
        n: Expr,
        by: Option<Vec<OrderItem>>,
    },
    Limit(Expr),
    Distinct(Option<Vec<Expr>>),
    Join {
        kind: JoinKind,
        table: TableRef,
        on: Expr,
    },
    Union(Vec<TableRef>),
}

impl OperationKind {
    /// The cost-model name used by the optimizer's ordering table.
    pub fn cost_tag(&self) -> &'static str {
        match self {
            OperationKind::Where(_) => "filter",
            OperationKind::Project(_) => "project",
            OperationKind::Extend(_) => "extend",
            OperationKind::Summarize { .. } => "summarize",
            OperationKind::Order(_) => "order",
            OperationKind::Top { .. } => "top",
            OperationKind::Limit(_) => "limit",
            OperationKind::Distinct(_) => "distinct",
            OperationKind::Join { .. } => "join",
            OperationKind::Union(_) => "union",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Between,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    Like,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Value, DataType),
    Identifier(String, bool),
    Member(Box<Expr>, String, bool),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Case(Vec<(Expr, Expr)>, Option<Box<Expr>>),
    Array(Vec<Expr>),
}

impl Expr {
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_, _))
    }

    pub fn as_literal(&self) -> Option<(&Value, DataType)> {
        match &self.kind {
            ExprKind::Literal(v, dt) => Some((v, *dt)),
            _ => None,
        }
    }
}
