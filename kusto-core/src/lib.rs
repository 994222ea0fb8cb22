//! Shared types for the KQL analytics core.
//!
//! Every other crate in the workspace depends on this one and nothing else
//! in the workspace; it carries the typed ids, the error/diagnostic
//! taxonomy, the config surface, the priority tiers, and the monitoring
//! rollup types so that no two crates need to redefine them.

mod config;
mod diagnostic;
mod error;
mod health;
mod identity;
mod priority;
mod value;

pub use config::*;
pub use diagnostic::*;
pub use error::*;
pub use health::*;
pub use identity::*;
pub use priority::*;
pub use value::*;
