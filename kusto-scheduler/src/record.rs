//! The query resource record: one entry per in-flight or queued query,
//! tracked for the lifetime of admission through completion.

use kusto_core::{Priority, QueryId};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct QueryResourceRecord {
    pub id: QueryId,
    /// The tier accounting is charged against. Starvation promotion changes
    /// [`Self::scheduling_priority`] for queue ordering only; this field
    /// never changes.
    pub priority: Priority,
    pub estimated_memory_bytes: u64,
    pub estimated_complexity: u64,
    pub status: QueryStatus,
    pub enqueued_at: Instant,
    /// The tier used when comparing against the queue head. Starts equal to
    /// `priority` and is bumped by [`Priority::promote`] once the query has
    /// waited past the starvation threshold.
    pub scheduling_priority: Priority,
    /// Set when [`Priority::promote`] would otherwise be the only
    /// admission-order change; `running_since` marks when this record last
    /// transitioned to `Running`, used for stuck-query detection.
    pub running_since: Option<Instant>,
    /// Cooperative cancellation flag for a `Running` query. The scheduler
    /// does not release accounting when this is set — the executor is
    /// expected to observe it at its own suspension point and abort.
    pub cancel_requested: bool,
}

impl QueryResourceRecord {
    pub fn new(
        id: QueryId,
        priority: Priority,
        estimated_memory_bytes: u64,
        estimated_complexity: u64,
        now: Instant,
    ) -> Self {
        Self {
            id,
            priority,
            estimated_memory_bytes,
            estimated_complexity,
            status: QueryStatus::Queued,
            enqueued_at: now,
            scheduling_priority: priority,
            running_since: None,
            cancel_requested: false,
        }
    }

    pub fn wait_time(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}
