//! The one concrete [`SchemaProvider`] the core ships: an in-memory table
//! catalog plus a fixed function/operator table. A real deployment would
//! swap this for a provider backed by its own metadata store; this is the
//! default used by tests and by callers with a static schema.

use kusto_validator::{FunctionClass, FunctionSig, OperatorSig, SchemaProvider, TableSchema};
use kusto_core::DataType;
use std::collections::HashMap;

pub struct StaticSchema {
    tables: HashMap<String, TableSchema>,
    functions: Vec<FunctionSig>,
    operators: Vec<OperatorSig>,
}

impl StaticSchema {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name.to_ascii_lowercase(), t))
                .collect(),
            functions: default_functions(),
            operators: default_operators(),
        }
    }

    pub fn with_catalog(
        tables: Vec<TableSchema>,
        functions: Vec<FunctionSig>,
        operators: Vec<OperatorSig>,
    ) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name.to_ascii_lowercase(), t))
                .collect(),
            functions,
            operators,
        }
    }
}

impl SchemaProvider for StaticSchema {
    fn get_table(&self, name: &str) -> Option<TableSchema> {
        self.tables.get(&name.to_ascii_lowercase()).cloned()
    }

    fn get_functions(&self) -> Vec<FunctionSig> {
        self.functions.clone()
    }

    fn get_operators(&self) -> Vec<OperatorSig> {
        self.operators.clone()
    }
}

fn default_functions() -> Vec<FunctionSig> {
    vec![
        FunctionSig {
            name: "count".to_string(),
            class: FunctionClass::Aggregate,
            arity: Some(0),
            arg_types: vec![],
            return_type: DataType::Integer,
        },
        FunctionSig {
            name: "dcount".to_string(),
            class: FunctionClass::Aggregate,
            arity: Some(1),
            arg_types: vec![],
            return_type: DataType::Integer,
        },
        FunctionSig {
            name: "sum".to_string(),
            class: FunctionClass::Aggregate,
            arity: Some(1),
            arg_types: vec![],
            return_type: DataType::Float,
        },
        FunctionSig {
            name: "avg".to_string(),
            class: FunctionClass::Aggregate,
            arity: Some(1),
            arg_types: vec![],
            return_type: DataType::Float,
        },
        FunctionSig {
            name: "min".to_string(),
            class: FunctionClass::Aggregate,
            arity: Some(1),
            arg_types: vec![],
            return_type: DataType::Float,
        },
        FunctionSig {
            name: "max".to_string(),
            class: FunctionClass::Aggregate,
            arity: Some(1),
            arg_types: vec![],
            return_type: DataType::Float,
        },
        FunctionSig {
            name: "strlen".to_string(),
            class: FunctionClass::Scalar,
            arity: Some(1),
            arg_types: vec![DataType::String],
            return_type: DataType::Integer,
        },
        FunctionSig {
            name: "tolower".to_string(),
            class: FunctionClass::Scalar,
            arity: Some(1),
            arg_types: vec![DataType::String],
            return_type: DataType::String,
        },
        FunctionSig {
            name: "toupper".to_string(),
            class: FunctionClass::Scalar,
            arity: Some(1),
            arg_types: vec![DataType::String],
            return_type: DataType::String,
        },
    ]
}

fn default_operators() -> Vec<OperatorSig> {
    let mut ops = Vec::new();
    for symbol in ["==", "!=", "<", "<=", ">", ">="] {
        for dt in [DataType::Integer, DataType::Float, DataType::String, DataType::Datetime] {
            ops.push(OperatorSig {
                symbol: symbol.to_string(),
                left: dt,
                right: dt,
                result: DataType::Boolean,
            });
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use kusto_validator::ColumnSchema;

    #[test]
    fn resolves_table_case_insensitively() {
        let schema = StaticSchema::new(vec![TableSchema {
            name: "Users".to_string(),
            columns: vec![ColumnSchema {
                name: "age".to_string(),
                data_type: DataType::Integer,
            }],
            estimated_row_count: Some(10_000),
        }]);
        assert!(schema.get_table("users").is_some());
        assert!(schema.get_table("USERS").is_some());
        assert!(schema.get_table("Orders").is_none());
    }

    #[test]
    fn ships_a_default_function_catalog() {
        let schema = StaticSchema::new(vec![]);
        assert!(schema.get_function("count").is_some());
        assert!(schema.get_function("dcount").is_some());
        assert!(schema.get_function("nonexistent").is_none());
    }
}
