//! Per-subsystem error taxonomy, composed into [`KqlError`].
//!
//! Each subsystem owns a `thiserror`-derived enum for the failures it can
//! produce; [`KqlError`] wraps each with `#[from]` so callers that bubble
//! errors up through `?` land on one type. `line`/`column` fields are plain
//! `usize`s rather than a `Span` so this crate does not need to depend on
//! `kusto-lang` just to describe where a lex/parse error occurred.

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use thiserror::Error;

/// Lexer failures. The lexer itself never returns `Err` (it always reaches
/// `eof` and accumulates diagnostics instead) — these variants are the typed
/// reasons behind those diagnostics, and are also returned by APIs that need
/// a single authoritative lex failure (e.g. the cache's canonicalization step).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },

    #[error("unterminated block comment at line {line}, column {column}")]
    UnterminatedComment { line: usize, column: usize },

    #[error("invalid number literal '{text}' at line {line}, column {column}")]
    InvalidNumber {
        text: String,
        line: usize,
        column: usize,
    },

    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedCharacter { ch: char, line: usize, column: usize },
}

impl LexError {
    pub fn into_diagnostic(self) -> Diagnostic {
        let (message, line, column) = match &self {
            LexError::UnterminatedString { line, column } => {
                (self.to_string(), *line, *column)
            }
            LexError::UnterminatedComment { line, column } => {
                (self.to_string(), *line, *column)
            }
            LexError::InvalidNumber { line, column, .. } => (self.to_string(), *line, *column),
            LexError::UnexpectedCharacter { line, column, .. } => {
                (self.to_string(), *line, *column)
            }
        };
        Diagnostic::new(DiagnosticKind::Syntax, message).at(line, column)
    }
}

/// Parser failures that abort resynchronization entirely (a wholly malformed
/// query). Per-operation syntax errors are recovered from and surfaced as
/// diagnostics instead, never as this error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {expected}, found {found} at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("query is empty")]
    EmptyQuery,

    #[error("unresolvable syntax error at line {line}, column {column}: {message}")]
    Unrecoverable {
        message: String,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn into_diagnostic(self) -> Diagnostic {
        match self {
            ParseError::UnexpectedToken {
                expected,
                found,
                line,
                column,
            } => Diagnostic::syntax(format!("expected {expected}, found {found}"))
                .at(line, column),
            ParseError::EmptyQuery => Diagnostic::syntax("query is empty"),
            ParseError::Unrecoverable {
                message,
                line,
                column,
            } => Diagnostic::syntax(message).at(line, column),
        }
    }
}

/// Semantic validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown table '{name}'")]
    UnknownTable { name: String },

    #[error("unknown column '{name}'")]
    UnknownColumn { name: String },

    #[error("aggregate function '{name}' used outside summarize")]
    AggregateOutsideSummarize { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("function '{name}' argument {index} expects type {expected:?}, got {got:?}")]
    TypeMismatch {
        name: String,
        index: usize,
        expected: crate::value::DataType,
        got: crate::value::DataType,
    },
}

impl ValidationError {
    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::semantic(self.to_string())
    }
}

/// Optimizer failures. The optimizer is near-total over validated ASTs; this
/// exists for rewrites that discover a construct they cannot safely rewrite.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptimizeError {
    #[error("optimizer invariant violated: {0}")]
    InvariantViolated(String),
}

/// SQL generation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SqlGenError {
    #[error("unsupported function: {name}")]
    UnsupportedFunction { name: String },

    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },

    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),
}

/// Cache failures. Per the propagation policy these are never fatal: the
/// executor facade logs (as data, via the monitoring surface) and bypasses
/// the cache rather than failing the query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("failed to serialize cache entry: {0}")]
    Serialization(String),

    #[error("failed to compress cache entry: {0}")]
    Compression(String),

    #[error("entry exceeds byte ceiling even after eviction")]
    CapacityExceeded,
}

/// Scheduler / admission failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("estimated complexity {estimated} exceeds cap {cap}")]
    ComplexityExceeded { estimated: u64, cap: u64 },

    #[error("queue deadline expired before admission")]
    QueueTimeout,

    #[error("execution deadline expired")]
    ExecTimeout,

    #[error("query was cancelled")]
    Cancelled,

    #[error("no such query id")]
    NotFound,
}

/// Backend / executor-facade failures.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("syntax error")]
    Syntax(Vec<Diagnostic>),

    #[error("semantic error")]
    Semantic(Vec<Diagnostic>),

    #[error("unsupported: {0}")]
    Unsupported(#[from] SqlGenError),

    #[error(transparent)]
    Resource(#[from] SchedulerError),

    #[error("backend error: {0}")]
    Backend(String),
}

impl ExecError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ExecError::Syntax(_) => DiagnosticKind::Syntax,
            ExecError::Semantic(_) => DiagnosticKind::Semantic,
            ExecError::Unsupported(_) => DiagnosticKind::Unsupported,
            ExecError::Resource(SchedulerError::ComplexityExceeded { .. }) => {
                DiagnosticKind::Resource
            }
            ExecError::Resource(SchedulerError::QueueTimeout) => DiagnosticKind::QueueTimeout,
            ExecError::Resource(SchedulerError::ExecTimeout) => DiagnosticKind::ExecTimeout,
            ExecError::Resource(SchedulerError::Cancelled) => DiagnosticKind::Cancelled,
            ExecError::Resource(SchedulerError::NotFound) => DiagnosticKind::Resource,
            ExecError::Backend(_) => DiagnosticKind::Backend,
        }
    }
}

/// Configuration validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for the analytics core.
#[derive(Debug, Clone, Error)]
pub enum KqlError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("optimize error: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("sql generation error: {0}")]
    SqlGen(#[from] SqlGenError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("executor error: {0}")]
    Exec(#[from] ExecError),
}

/// Workspace-wide result alias.
pub type KqlResult<T> = Result<T, KqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_converts_to_syntax_diagnostic() {
        let err = LexError::UnexpectedCharacter {
            ch: '$',
            line: 2,
            column: 5,
        };
        let diag = err.into_diagnostic();
        assert_eq!(diag.kind, DiagnosticKind::Syntax);
        assert_eq!(diag.line, Some(2));
    }

    #[test]
    fn exec_error_kind_maps_scheduler_variants() {
        let err = ExecError::Resource(SchedulerError::QueueTimeout);
        assert_eq!(err.kind(), DiagnosticKind::QueueTimeout);
    }

    #[test]
    fn from_conversions_compose_into_kql_error() {
        let err: KqlError = ValidationError::UnknownTable {
            name: "Ghosts".into(),
        }
        .into();
        assert!(matches!(err, KqlError::Validation(_)));
    }
}
