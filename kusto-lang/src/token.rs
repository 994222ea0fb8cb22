//! Token kinds and spans.

use kusto_core::Value;
use serde::{Deserialize, Serialize};

/// The closed set of token kinds. Keywords and multi-character operators are
/// always recognized by table lookup (see `Lexer::scan_identifier`'s match
/// block and `Lexer::next_token`'s operator peeking), never by substring scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    Datetime(String),
    /// Canonical duration in nanoseconds, plus the original lexeme for pretty-printing.
    Timespan(i64),
    Guid(String),
    Identifier(String),
    QuotedIdentifier(String),

    // Pipeline keywords
    Where,
    Project,
    Extend,
    Summarize,
    By,
    Order,
    Asc,
    Desc,
    Top,
    Limit,
    Distinct,
    Join,
    Inner,
    Left,
    Right,
    Full,
    On,
    Union,
    Let,
    As,

    // Logical / comparison keywords
    And,
    Or,
    Not,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    Like,
    Between,

    // Case expression
    Case,
    When,
    Then,
    Else,
    End,

    // Operators
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pipe,

    // Punctuation
    Comma,
    Semicolon,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Eof,
    Error(String),
}

impl TokenKind {
    /// The typed literal value carried by this token, if it is a literal.
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            TokenKind::String(s) => Some(Value::String(s.clone())),
            TokenKind::Integer(i) => Some(Value::Integer(*i)),
            TokenKind::Float(f) => Some(Value::Float(*f)),
            TokenKind::Boolean(b) => Some(Value::Boolean(*b)),
            TokenKind::Null => Some(Value::Null),
            TokenKind::Datetime(dt) => Some(Value::Datetime(dt.clone())),
            TokenKind::Timespan(ns) => Some(Value::Timespan(*ns)),
            TokenKind::Guid(g) => Some(Value::Guid(g.clone())),
            _ => None,
        }
    }
}

/// A source location range plus line/column of the first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// An immutable lexed token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
