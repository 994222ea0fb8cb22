//! Request options and the result shape returned by [`crate::Executor::execute`].

use crate::backend::Row;
use kusto_core::{DataType, Priority};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub priority: Priority,
    pub timeout: Duration,
    /// `false` disables both the lookup and the insertion for this call.
    pub cache: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
            timeout: Duration::from_secs(30),
            cache: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<(String, DataType)>,
    pub rows: Vec<Row>,
    pub cached: bool,
    pub row_count: usize,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

/// `Duration` has no native `serde` impl; millisecond precision is more than
/// enough for a timing field and keeps cached entries portable as JSON.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (value.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
