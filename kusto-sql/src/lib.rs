//! Parameterized, tenant-scoped SQL generation from an optimized AST.

mod generator;

pub use generator::{emit_sql, ExecutionContext, SqlResult};
