//! The executor facade: the public entry point wiring together the lexer,
//! parser, validator, optimizer, SQL generator, cache, and scheduler.
//!
//! The lower-level pipeline stages remain directly callable for introspection
//! (`kusto_lang::parse`, `kusto_validator::validate`, `kusto_optimizer::optimize`,
//! `kusto_sql::emit_sql`) — [`Executor::execute`] is the orchestrated sequence,
//! not the only way to reach these stages.

mod backend;
mod facade;
mod result;
mod schema;

pub use backend::{Backend, Row};
pub use facade::{Executor, DEFAULT_MAX_CACHEABLE_ROWS};
pub use result::{ExecutionOptions, QueryResult};
pub use schema::StaticSchema;
