//! The read-only schema/function-catalog surface the validator resolves
//! against. Callers implement [`SchemaProvider`]; the core ships no
//! concrete implementation of its own (that lives in `kusto-exec`, the way
//! `caliber-storage` ships the one concrete `CacheBackend` next to its
//! trait while the trait itself stays backend-agnostic).

use kusto_core::DataType;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    /// Schema-reported row count estimate, used by the optimizer's cost
    /// model as the initial cardinality; `None` falls back to a default.
    pub estimated_row_count: Option<u64>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionClass {
    Scalar,
    Aggregate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub name: String,
    pub class: FunctionClass,
    /// `None` means variadic (arity is not checked).
    pub arity: Option<usize>,
    pub arg_types: Vec<DataType>,
    pub return_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSig {
    pub symbol: String,
    pub left: DataType,
    pub right: DataType,
    pub result: DataType,
}

/// Read-only schema access. Implementations may cache with a TTL and serve
/// stale reads; the validator never mutates through this trait. `Send + Sync`
/// so the executor facade can hold one behind a plain `Arc<dyn SchemaProvider>`
/// shared across query threads.
pub trait SchemaProvider: Send + Sync {
    fn get_table(&self, name: &str) -> Option<TableSchema>;
    fn get_functions(&self) -> Vec<FunctionSig>;
    fn get_operators(&self) -> Vec<OperatorSig>;

    fn get_function(&self, name: &str) -> Option<FunctionSig> {
        self.get_functions()
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}
