//! The injected SQL backend interface. The executor facade is agnostic to
//! the storage engine behind it — tests and callers supply their own
//! [`Backend`], the same seam `caliber-storage::cache::traits::CacheBackend`
//! draws between the cache trait and its one concrete LMDB implementation.

use kusto_core::{DataType, Value};
use std::time::Instant;

pub type Row = Vec<Value>;

/// A single blocking call: `execute(sql, params, deadline) -> (columns, rows)`.
/// Cancellation is signalled by the deadline; a backend that cannot observe
/// cancellation mid-flight simply runs to completion or to its own timeout.
pub trait Backend: Send + Sync {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
        deadline: Instant,
    ) -> Result<(Vec<(String, DataType)>, Vec<Row>), String>;
}

#[cfg(test)]
pub(crate) struct FixedBackend {
    pub columns: Vec<(String, DataType)>,
    pub rows: Vec<Row>,
}

#[cfg(test)]
impl Backend for FixedBackend {
    fn execute(
        &self,
        _sql: &str,
        _params: &[Value],
        _deadline: Instant,
    ) -> Result<(Vec<(String, DataType)>, Vec<Row>), String> {
        Ok((self.columns.clone(), self.rows.clone()))
    }
}
