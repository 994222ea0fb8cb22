//! Structured diagnostics surfaced by the lexer, parser, and validator.

use serde::{Deserialize, Serialize};

/// The stable error-kind taxonomy from the core's error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    Syntax,
    Semantic,
    Unsupported,
    Resource,
    QueueTimeout,
    ExecTimeout,
    Cancelled,
    Backend,
    Cache,
}

/// One structured diagnostic: `{kind, message, line?, column?, suggestions?}`.
///
/// Line/column are populated for syntax and semantic diagnostics. Suggestions
/// are best-effort and may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            column: None,
            suggestions: Vec::new(),
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Syntax, message)
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Semantic, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_position_and_suggestions() {
        let d = Diagnostic::syntax("unterminated string")
            .at(3, 7)
            .with_suggestion("close the quote");
        assert_eq!(d.kind, DiagnosticKind::Syntax);
        assert_eq!(d.line, Some(3));
        assert_eq!(d.column, Some(7));
        assert_eq!(d.suggestions, vec!["close the quote".to_string()]);
    }

    #[test]
    fn default_has_no_position_or_suggestions() {
        let d = Diagnostic::semantic("unknown column");
        assert!(d.line.is_none());
        assert!(d.suggestions.is_empty());
    }
}
