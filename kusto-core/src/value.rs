//! Typed literal values shared by tokens, AST literals, and SQL parameters.

use serde::{Deserialize, Serialize};

/// The declared type of a literal or resolved column, one-to-one with [`Value`]'s variants.
///
/// Constant folding only narrows a type (e.g. `Float` -> `Integer` when a division
/// happens to land on a whole number is never performed); it never widens one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    Null,
    Timespan,
    Datetime,
    Guid,
}

/// A typed scalar value: a token's literal payload, an AST `Literal` node's value,
/// or a bound SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    /// Canonical duration in nanoseconds.
    Timespan(i64),
    /// Canonical ISO-8601 datetime text, preserved verbatim from the literal.
    Datetime(String),
    Guid(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
            Value::Null => DataType::Null,
            Value::Timespan(_) => DataType::Timespan,
            Value::Datetime(_) => DataType::Datetime,
            Value::Guid(_) => DataType::Guid,
        }
    }

    /// A stable textual form used by the cache's query-fingerprint canonicalization.
    pub fn canonical_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Timespan(ns) => ns.to_string(),
            Value::Datetime(dt) => dt.clone(),
            Value::Guid(g) => g.to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_matches_variant() {
        assert_eq!(Value::Integer(3).data_type(), DataType::Integer);
        assert_eq!(Value::Null.data_type(), DataType::Null);
    }

    #[test]
    fn guid_canonicalizes_to_lowercase() {
        let v = Value::Guid("ABCDEF00-0000-0000-0000-000000000000".to_string());
        assert_eq!(v.canonical_text(), "abcdef00-0000-0000-0000-000000000000");
    }
}
