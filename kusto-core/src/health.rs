//! Monitoring/health rollup types, exposed as plain data rather than emitted
//! as log lines — callers decide whether to log or export them.

use crate::priority::PriorityCounts;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Three-value health rollup driven by the scheduler's configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// The scheduler's monitoring surface: current memory usage, active/queued
/// counts by priority, average queue wait, completed/failed counters, and
/// the derived health rollup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsageSnapshot {
    pub current_memory_bytes: u64,
    pub active_by_priority: PriorityCounts,
    pub queued_by_priority: PriorityCounts,
    pub average_queue_wait: Duration,
    pub completed_count: u64,
    pub failed_count: u64,
    pub stuck_query_count: u64,
    pub health: HealthStatus,
}

impl ResourceUsageSnapshot {
    pub fn total_active(&self) -> usize {
        self.active_by_priority.critical
            + self.active_by_priority.high
            + self.active_by_priority.normal
            + self.active_by_priority.low
    }

    pub fn total_queued(&self) -> usize {
        self.queued_by_priority.critical
            + self.queued_by_priority.high
            + self.queued_by_priority.normal
            + self.queued_by_priority.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_all_tiers() {
        let snap = ResourceUsageSnapshot {
            current_memory_bytes: 0,
            active_by_priority: PriorityCounts {
                critical: 1,
                high: 2,
                normal: 3,
                low: 4,
            },
            queued_by_priority: PriorityCounts::default(),
            average_queue_wait: Duration::ZERO,
            completed_count: 0,
            failed_count: 0,
            stuck_query_count: 0,
            health: HealthStatus::Healthy,
        };
        assert_eq!(snap.total_active(), 10);
        assert_eq!(snap.total_queued(), 0);
    }
}
