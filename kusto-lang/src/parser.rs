//! Tokens to AST: recursive-descent with Pratt-style precedence for
//! expressions, following `caliber-dsl::parser::parser::Parser`'s
//! `Result<T, ParseError>` + `match &self.current().kind` + expect/check/
//! advance/error helper style.
//!
//! A syntax error on one pipeline operation is recorded as a diagnostic and
//! the parser resynchronizes at the next `|` or `;`, per the grammar's
//! error-recovery rule; only a wholly unresolvable failure surfaces as
//! `ParseError` instead of a diagnostic.

use crate::ast::*;
use crate::token::{Span, Token, TokenKind};
use kusto_core::{Diagnostic, ParseError};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

type PResult<T> = Result<T, ParseError>;

/// Parse a complete query. Returns the partial-or-complete AST alongside
/// every diagnostic accumulated during lexing and parsing.
pub fn parse(source: &str) -> (Option<Query>, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = crate::lexer::Lexer::new(source).tokenize();
    let mut parser = Parser::new(tokens);
    let query = parser.parse_query();
    diagnostics.extend(parser.diagnostics);
    match query {
        Ok(q) => (Some(q), diagnostics),
        Err(e) => {
            diagnostics.push(e.into_diagnostic());
            (None, diagnostics)
        }
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    fn parse_query(&mut self) -> PResult<Query> {
        let start_span = self.current().span;
        let mut lets = Vec::new();
        while self.check(&TokenKind::Let) {
            lets.push(self.parse_let_statement()?);
        }

        let table = self.parse_table_ref()?;
        let mut pipeline = Vec::new();

        while self.check(&TokenKind::Pipe) {
            self.advance();
            match self.parse_operation() {
                Ok(op) => pipeline.push(op),
                Err(e) => {
                    self.diagnostics.push(e.into_diagnostic());
                    self.resynchronize();
                }
            }
        }

        if !self.is_at_end() {
            return Err(self.error(format!(
                "unexpected trailing token {:?}",
                self.current().kind
            )));
        }

        let end_span = self.previous_span();
        Ok(Query {
            lets,
            table,
            pipeline,
            span: Span {
                start: start_span.start,
                end: end_span.end,
                line: start_span.line,
                column: start_span.column,
            },
        })
    }

    /// Skip tokens until the next `|`, `;`, or `eof` so the next pipeline
    /// stage can be attempted independently of a malformed one.
    fn resynchronize(&mut self) {
        while !self.is_at_end()
            && !self.check(&TokenKind::Pipe)
            && !self.check(&TokenKind::Semicolon)
        {
            self.advance();
        }
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn parse_let_statement(&mut self) -> PResult<LetStatement> {
        let start = self.current().span;
        self.expect(&TokenKind::Let, "let")?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Assign, "=")?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon, ";")?;
        Ok(LetStatement {
            name,
            expr,
            span: start,
        })
    }

    fn parse_table_ref(&mut self) -> PResult<TableRef> {
        let span = self.current().span;
        let name = self.expect_identifier()?;
        let alias = if self.check_identifier_ahead() {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(TableRef { name, alias, span })
    }

    fn parse_operation(&mut self) -> PResult<Operation> {
        let span = self.current().span;
        let kind = match &self.current().kind {
            TokenKind::Where => {
                self.advance();
                OperationKind::Where(self.parse_expr()?)
            }
            TokenKind::Project => {
                self.advance();
                OperationKind::Project(self.parse_proj_cols()?)
            }
            TokenKind::Extend => {
                self.advance();
                OperationKind::Extend(self.parse_assigns()?)
            }
            TokenKind::Summarize => {
                self.advance();
                self.parse_summarize()?
            }
            TokenKind::Order => {
                self.advance();
                self.expect(&TokenKind::By, "by")?;
                OperationKind::Order(self.parse_order_items()?)
            }
            TokenKind::Top => {
                self.advance();
                let n = self.parse_expr()?;
                let by = if self.check(&TokenKind::By) {
                    self.advance();
                    Some(self.parse_order_items()?)
                } else {
                    None
                };
                OperationKind::Top { n, by }
            }
            TokenKind::Limit => {
                self.advance();
                OperationKind::Limit(self.parse_expr()?)
            }
            TokenKind::Distinct => {
                self.advance();
                if self.is_operation_boundary() {
                    OperationKind::Distinct(None)
                } else {
                    OperationKind::Distinct(Some(self.parse_expr_list()?))
                }
            }
            TokenKind::Join => {
                self.advance();
                self.parse_join()?
            }
            TokenKind::Union => {
                self.advance();
                OperationKind::Union(self.parse_table_ref_list()?)
            }
            other => {
                return Err(self.error(format!("expected a pipeline operation, found {other:?}")))
            }
        };
        Ok(Operation { kind, span })
    }

    fn parse_proj_cols(&mut self) -> PResult<Vec<ProjCol>> {
        let mut cols = vec![self.parse_proj_col()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            cols.push(self.parse_proj_col()?);
        }
        Ok(cols)
    }

    fn parse_proj_col(&mut self) -> PResult<ProjCol> {
        let expr = self.parse_expr()?;
        let alias = if self.check(&TokenKind::As) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(ProjCol { expr, alias })
    }

    fn parse_assigns(&mut self) -> PResult<Vec<Assign>> {
        let mut assigns = vec![self.parse_assign()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            assigns.push(self.parse_assign()?);
        }
        Ok(assigns)
    }

    fn parse_assign(&mut self) -> PResult<Assign> {
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Assign, "=")?;
        let expr = self.parse_expr()?;
        Ok(Assign { name, expr })
    }

    fn parse_summarize(&mut self) -> PResult<OperationKind> {
        let mut aggs = vec![self.parse_agg()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            aggs.push(self.parse_agg()?);
        }
        let group_by = if self.check(&TokenKind::By) {
            self.advance();
            Some(self.parse_expr_list()?)
        } else {
            None
        };
        Ok(OperationKind::Summarize { aggs, group_by })
    }

    fn parse_agg(&mut self) -> PResult<Agg> {
        let func = self.expect_identifier()?;
        self.expect(&TokenKind::LParen, "(")?;
        let arg = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::RParen, ")")?;
        let alias = if self.check(&TokenKind::As) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(Agg { func, arg, alias })
    }

    fn parse_order_items(&mut self) -> PResult<Vec<OrderItem>> {
        let mut items = vec![self.parse_order_item()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            items.push(self.parse_order_item()?);
        }
        Ok(items)
    }

    fn parse_order_item(&mut self) -> PResult<OrderItem> {
        let expr = self.parse_expr()?;
        let dir = if self.check(&TokenKind::Desc) {
            self.advance();
            SortDir::Desc
        } else if self.check(&TokenKind::Asc) {
            self.advance();
            SortDir::Asc
        } else {
            SortDir::Asc
        };
        Ok(OrderItem { expr, dir })
    }

    fn parse_join(&mut self) -> PResult<OperationKind> {
        let kind = match &self.current().kind {
            TokenKind::Inner => {
                self.advance();
                JoinKind::Inner
            }
            TokenKind::Left => {
                self.advance();
                JoinKind::Left
            }
            TokenKind::Right => {
                self.advance();
                JoinKind::Right
            }
            TokenKind::Full => {
                self.advance();
                JoinKind::Full
            }
            _ => JoinKind::Inner,
        };
        let table = self.parse_table_ref()?;
        self.expect(&TokenKind::On, "on")?;
        let on = self.parse_expr()?;
        Ok(OperationKind::Join { kind, table, on })
    }

    fn parse_table_ref_list(&mut self) -> PResult<Vec<TableRef>> {
        let mut tables = vec![self.parse_table_ref()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            tables.push(self.parse_table_ref()?);
        }
        Ok(tables)
    }

    fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    // ---- expression grammar, low to high precedence ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            let span = self.current().span;
            self.advance();
            let right = self.parse_and()?;
            left = Self::binary(BinaryOp::Or, left, right, span);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(&TokenKind::And) {
            let span = self.current().span;
            self.advance();
            let right = self.parse_equality()?;
            left = Self::binary(BinaryOp::And, left, right, span);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match &self.current().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            let span = self.current().span;
            self.advance();
            let right = self.parse_comparison()?;
            left = Self::binary(op, left, right, span);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_string_ops()?;
        loop {
            match &self.current().kind {
                TokenKind::Lt => {
                    let span = self.current().span;
                    self.advance();
                    let right = self.parse_string_ops()?;
                    left = Self::binary(BinaryOp::Lt, left, right, span);
                }
                TokenKind::Le => {
                    let span = self.current().span;
                    self.advance();
                    let right = self.parse_string_ops()?;
                    left = Self::binary(BinaryOp::Le, left, right, span);
                }
                TokenKind::Gt => {
                    let span = self.current().span;
                    self.advance();
                    let right = self.parse_string_ops()?;
                    left = Self::binary(BinaryOp::Gt, left, right, span);
                }
                TokenKind::Ge => {
                    let span = self.current().span;
                    self.advance();
                    let right = self.parse_string_ops()?;
                    left = Self::binary(BinaryOp::Ge, left, right, span);
                }
                TokenKind::In => {
                    let span = self.current().span;
                    self.advance();
                    let right = self.parse_paren_list()?;
                    left = Self::binary(BinaryOp::In, left, right, span);
                }
                TokenKind::NotIn => {
                    let span = self.current().span;
                    self.advance();
                    let right = self.parse_paren_list()?;
                    left = Self::binary(BinaryOp::NotIn, left, right, span);
                }
                TokenKind::Between => {
                    let span = self.current().span;
                    self.advance();
                    let range = self.parse_between_range()?;
                    left = Self::binary(BinaryOp::Between, left, range, span);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    /// `expr in (a, b, c)` / `expr !in (a, b, c)`: the right side is the
    /// parenthesized candidate list, represented as an `Array` node.
    fn parse_paren_list(&mut self) -> PResult<Expr> {
        let span = self.current().span;
        self.expect(&TokenKind::LParen, "(")?;
        let items = if self.check(&TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };
        self.expect(&TokenKind::RParen, ")")?;
        Ok(Expr {
            kind: ExprKind::Array(items),
            span,
        })
    }

    /// `expr between (low .. high)`: the bounds are represented as a
    /// two-element `Array` node on the right of the `Between` binary op.
    fn parse_between_range(&mut self) -> PResult<Expr> {
        let span = self.current().span;
        self.expect(&TokenKind::LParen, "(")?;
        let low = self.parse_additive()?;
        self.expect(&TokenKind::Dot, ".")?;
        self.expect(&TokenKind::Dot, ".")?;
        let high = self.parse_additive()?;
        self.expect(&TokenKind::RParen, ")")?;
        Ok(Expr {
            kind: ExprKind::Array(vec![low, high]),
            span,
        })
    }

    fn parse_string_ops(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match &self.current().kind {
                TokenKind::Contains => BinaryOp::Contains,
                TokenKind::NotContains => BinaryOp::NotContains,
                TokenKind::StartsWith => BinaryOp::StartsWith,
                TokenKind::EndsWith => BinaryOp::EndsWith,
                TokenKind::Matches => BinaryOp::Matches,
                TokenKind::Like => BinaryOp::Like,
                _ => break,
            };
            let span = self.current().span;
            self.advance();
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right, span);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match &self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let span = self.current().span;
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right, span);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let span = self.current().span;
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right, span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let span = self.current().span;
        match &self.current().kind {
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr {
                    kind: ExprKind::Unary(UnaryOp::Not, Box::new(operand)),
                    span,
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr {
                    kind: ExprKind::Unary(UnaryOp::Neg, Box::new(operand)),
                    span,
                })
            }
            TokenKind::Plus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr {
                    kind: ExprKind::Unary(UnaryOp::Pos, Box::new(operand)),
                    span,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match &self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let span = self.current().span;
                    let name = self.expect_identifier()?;
                    expr = Expr {
                        kind: ExprKind::Member(Box::new(expr), name, false),
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let span = self.current().span;
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "]")?;
                    let name = match &index.kind {
                        ExprKind::Literal(kusto_core::Value::String(s), _) => s.clone(),
                        _ => String::new(),
                    };
                    expr = Expr {
                        kind: ExprKind::Member(Box::new(expr), name, true),
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.current().span;
        match self.current().kind.clone() {
            TokenKind::Integer(i) => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::Integer(i), span))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::Float(f), span))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::String(s), span))
            }
            TokenKind::Boolean(b) => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::Boolean(b), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::Null, span))
            }
            TokenKind::Datetime(dt) => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::Datetime(dt), span))
            }
            TokenKind::Timespan(ns) => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::Timespan(ns), span))
            }
            TokenKind::Guid(g) => {
                self.advance();
                Ok(Self::literal(kusto_core::Value::Guid(g), span))
            }
            TokenKind::QuotedIdentifier(name) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Identifier(name, true),
                    span,
                })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = if self.check(&TokenKind::RParen) {
                        Vec::new()
                    } else {
                        self.parse_expr_list()?
                    };
                    self.expect(&TokenKind::RParen, ")")?;
                    Ok(Expr {
                        kind: ExprKind::Call(name, args),
                        span,
                    })
                } else {
                    Ok(Expr {
                        kind: ExprKind::Identifier(name, false),
                        span,
                    })
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, ")")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let items = if self.check(&TokenKind::RBracket) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(&TokenKind::RBracket, "]")?;
                Ok(Expr {
                    kind: ExprKind::Array(items),
                    span,
                })
            }
            TokenKind::Case => self.parse_case(),
            other => Err(self.error(format!("expected an expression, found {other:?}"))),
        }
    }

    fn parse_case(&mut self) -> PResult<Expr> {
        let span = self.current().span;
        self.expect(&TokenKind::Case, "case")?;
        let mut arms = Vec::new();
        while self.check(&TokenKind::When) {
            self.advance();
            let when = self.parse_expr()?;
            self.expect(&TokenKind::Then, "then")?;
            let then = self.parse_expr()?;
            arms.push((when, then));
        }
        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(&TokenKind::End, "end")?;
        Ok(Expr {
            kind: ExprKind::Case(arms, else_branch),
            span,
        })
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr, span: Span) -> Expr {
        Expr {
            kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
            span,
        }
    }

    fn literal(value: kusto_core::Value, span: Span) -> Expr {
        let dt = value.data_type();
        Expr {
            kind: ExprKind::Literal(value, dt),
            span,
        }
    }

    // ---- cursor helpers ----

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous_span(&self) -> Span {
        let idx = self.pos.saturating_sub(1).min(self.tokens.len() - 1);
        self.tokens[idx].span
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn is_operation_boundary(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Pipe | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    fn advance(&mut self) -> &Token {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        &self.tokens[self.pos - 1]
    }

    /// Variant-only comparison (ignores payload), mirroring the teacher's use
    /// of `std::mem::discriminant` so e.g. `Integer(1)` and `Integer(2)` are
    /// both recognized as "an Integer token".
    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn check_identifier_ahead(&self) -> bool {
        matches!(self.current().kind, TokenKind::Identifier(_))
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> PResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(expected))
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::QuotedIdentifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_expected("identifier")),
        }
    }

    fn error_expected(&self, expected: &str) -> ParseError {
        let span = self.current().span;
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: format!("{:?}", self.current().kind),
            line: span.line,
            column: span.column,
        }
    }

    fn error(&self, message: String) -> ParseError {
        let span = self.current().span;
        ParseError::Unrecoverable {
            message,
            line: span.line,
            column: span.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_query() {
        let (ast, diags) = parse("Users | where age > 18 | project name");
        assert!(diags.is_empty(), "{diags:?}");
        let ast = ast.unwrap();
        assert_eq!(ast.table.name, "Users");
        assert_eq!(ast.pipeline.len(), 2);
    }

    #[test]
    fn precedence_or_lower_than_and() {
        let (ast, diags) = parse("T | where a == 1 and b == 2 or c == 3");
        assert!(diags.is_empty());
        let op = &ast.unwrap().pipeline[0];
        match &op.kind {
            OperationKind::Where(expr) => match &expr.kind {
                ExprKind::Binary(BinaryOp::Or, left, _) => {
                    assert!(matches!(left.kind, ExprKind::Binary(BinaryOp::And, _, _)));
                }
                other => panic!("expected top-level Or, got {other:?}"),
            },
            _ => panic!("expected Where"),
        }
    }

    #[test]
    fn let_statement_before_pipeline() {
        let (ast, diags) = parse("let x = 5; T | where a > x");
        assert!(diags.is_empty());
        let ast = ast.unwrap();
        assert_eq!(ast.lets.len(), 1);
        assert_eq!(ast.lets[0].name, "x");
    }

    #[test]
    fn summarize_with_group_by() {
        let (ast, diags) = parse("T | summarize count(), avg(x) by category");
        assert!(diags.is_empty(), "{diags:?}");
        let ast = ast.unwrap();
        match &ast.pipeline[0].kind {
            OperationKind::Summarize { aggs, group_by } => {
                assert_eq!(aggs.len(), 2);
                assert!(group_by.is_some());
            }
            _ => panic!("expected summarize"),
        }
    }

    #[test]
    fn join_defaults_to_inner() {
        let (ast, diags) = parse("T | join U on T.id == U.id");
        assert!(diags.is_empty(), "{diags:?}");
        match &ast.unwrap().pipeline[0].kind {
            OperationKind::Join { kind, .. } => assert_eq!(*kind, JoinKind::Inner),
            _ => panic!("expected join"),
        }
    }

    #[test]
    fn case_when_then_else_end() {
        let (ast, diags) = parse("T | extend y = case when x > 0 then 1 else 0 end");
        assert!(diags.is_empty(), "{diags:?}");
        match &ast.unwrap().pipeline[0].kind {
            OperationKind::Extend(assigns) => {
                assert!(matches!(assigns[0].expr.kind, ExprKind::Case(_, _)));
            }
            _ => panic!("expected extend"),
        }
    }

    #[test]
    fn syntax_error_recovers_at_next_pipe() {
        let (ast, diags) = parse("T | where | project name");
        assert!(!diags.is_empty());
        let ast = ast.unwrap();
        assert_eq!(ast.pipeline.len(), 1);
        assert!(matches!(ast.pipeline[0].kind, OperationKind::Project(_)));
    }

    #[test]
    fn error_reports_line_and_column() {
        let (_, diags) = parse("T\n| where\n| project x");
        let d = &diags[0];
        assert!(d.line.is_some());
        assert!(d.column.is_some());
    }

    #[test]
    fn in_list_becomes_array_node() {
        let (ast, diags) = parse("T | where x in (1, 2, 3)");
        assert!(diags.is_empty(), "{diags:?}");
        match &ast.unwrap().pipeline[0].kind {
            OperationKind::Where(expr) => match &expr.kind {
                ExprKind::Binary(BinaryOp::In, _, right) => {
                    assert!(matches!(right.kind, ExprKind::Array(_)));
                }
                _ => panic!("expected In"),
            },
            _ => panic!("expected where"),
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_column_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,6}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_simple_where_queries_parse_without_diagnostics(
            table in "[A-Z][a-zA-Z0-9]{0,8}",
            col in arb_column_name(),
            n in 0i64..1000,
        ) {
            let src = format!("{table} | where {col} > {n}");
            let (ast, diags) = parse(&src);
            prop_assert!(diags.is_empty(), "{diags:?}");
            prop_assert!(ast.is_some());
        }

        #[test]
        fn prop_parser_never_panics_on_arbitrary_token_soup(
            src in "[a-zA-Z0-9 |=!<>()\\[\\]{}.,;_\"']{0,60}"
        ) {
            let _ = parse(&src);
        }
    }
}
