//! Schema-driven semantic validation: resolves table/column/function
//! references in a parsed query and reports diagnostics without mutating
//! the AST.

mod schema;
mod validator;

pub use schema::*;
pub use validator::validate;
