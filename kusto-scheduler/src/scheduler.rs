//! Admission control over a single coarse critical section. Resources are
//! released through a [`Condvar`] so waiters retry admission exactly once
//! per release rather than being fanned out to individually — the same
//! shape as `CompletionSignal` in the teacher pack's ingestion pipeline
//! (a `Mutex<bool>` + `Condvar` pair guarding a blocking wait), generalized
//! here to a priority admission queue instead of a single completion flag.

use crate::record::{QueryResourceRecord, QueryStatus};
use kusto_core::{
    AlertThresholds, HealthStatus, Priority, PriorityCounts, QueryId, ResourceUsageSnapshot,
    SchedulerConfig, SchedulerError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct Inner {
    records: HashMap<QueryId, QueryResourceRecord>,
    queue: VecDeque<QueryId>,
    current_memory_bytes: u64,
    active_by_priority: PriorityCounts,
    active_count: usize,
    completed_count: u64,
    failed_count: u64,
    wait_time_total: Duration,
    wait_time_samples: u64,
}

pub struct Scheduler {
    config: SchedulerConfig,
    inner: Mutex<Inner>,
    condvar: Condvar,
}

/// Held by the executor facade for the lifetime of an admitted query.
/// Accounting is released exactly once, whether by an explicit terminal
/// call or, on an early return / panic, by `Drop` (treated as `Failed`) —
/// this is the "scoped block so partial failures don't leak accounting"
/// behavior.
pub struct AdmissionGuard<'a> {
    scheduler: &'a Scheduler,
    id: QueryId,
    released: bool,
}

impl<'a> AdmissionGuard<'a> {
    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.scheduler
            .inner
            .lock()
            .expect("scheduler lock poisoned")
            .records
            .get(&self.id)
            .map(|r| r.cancel_requested)
            .unwrap_or(false)
    }

    pub fn complete(mut self) {
        self.scheduler.release(self.id, QueryStatus::Completed);
        self.released = true;
    }

    pub fn fail(mut self) {
        self.scheduler.release(self.id, QueryStatus::Failed);
        self.released = true;
    }

    pub fn cancelled(mut self) {
        self.scheduler.release(self.id, QueryStatus::Cancelled);
        self.released = true;
    }

    pub fn timed_out(mut self) {
        self.scheduler.release(self.id, QueryStatus::TimedOut);
        self.released = true;
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.scheduler.release(self.id, QueryStatus::Failed);
        }
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                records: HashMap::new(),
                queue: VecDeque::new(),
                current_memory_bytes: 0,
                active_by_priority: PriorityCounts::default(),
                active_count: 0,
                completed_count: 0,
                failed_count: 0,
                wait_time_total: Duration::ZERO,
                wait_time_samples: 0,
            }),
        }
    }

    /// Enqueues a query. Returns [`SchedulerError::ComplexityExceeded`]
    /// immediately (without enqueueing) when the estimate alone already
    /// exceeds the cap — this is a permanent rejection, not a queue state.
    pub fn submit(
        &self,
        id: QueryId,
        priority: Priority,
        estimated_memory_bytes: u64,
        estimated_complexity: u64,
    ) -> Result<(), SchedulerError> {
        if estimated_complexity > self.config.max_query_complexity {
            return Err(SchedulerError::ComplexityExceeded {
                estimated: estimated_complexity,
                cap: self.config.max_query_complexity,
            });
        }
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("scheduler lock poisoned");
        inner.records.insert(
            id,
            QueryResourceRecord::new(id, priority, estimated_memory_bytes, estimated_complexity, now),
        );
        inner.queue.push_back(id);
        Ok(())
    }

    /// Blocks until `id` is admitted, cancelled, or `queue_deadline` elapses.
    pub fn admit(&self, id: QueryId, queue_deadline: Duration) -> Result<AdmissionGuard<'_>, SchedulerError> {
        let deadline = Instant::now() + queue_deadline;
        let mut inner = self.inner.lock().expect("scheduler lock poisoned");

        loop {
            let now = Instant::now();
            promote_starved(&mut inner, now, self.config.stuck_query_threshold);
            dispatch(&mut inner, &self.config, now);

            match inner.records.get(&id).map(|r| r.status) {
                Some(QueryStatus::Running) => {
                    return Ok(AdmissionGuard {
                        scheduler: self,
                        id,
                        released: false,
                    });
                }
                Some(QueryStatus::Cancelled) => return Err(SchedulerError::Cancelled),
                Some(QueryStatus::Queued) => {}
                _ => return Err(SchedulerError::NotFound),
            }

            if now >= deadline {
                inner.queue.retain(|qid| *qid != id);
                inner.records.remove(&id);
                return Err(SchedulerError::QueueTimeout);
            }

            let remaining = deadline.saturating_duration_since(now);
            let (guard, _timed_out) = self
                .condvar
                .wait_timeout(inner, remaining.min(Duration::from_millis(50)))
                .expect("scheduler lock poisoned");
            inner = guard;
        }
    }

    /// Cancellation is cooperative: a queued query is dequeued immediately,
    /// a running one only has its flag set — the executor observes it at
    /// its own suspension point and aborts the backend call.
    pub fn cancel(&self, id: QueryId) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock().expect("scheduler lock poisoned");
        let status = inner.records.get(&id).map(|r| r.status);
        match status {
            None => Err(SchedulerError::NotFound),
            Some(QueryStatus::Queued) => {
                inner.queue.retain(|qid| *qid != id);
                if let Some(record) = inner.records.get_mut(&id) {
                    record.status = QueryStatus::Cancelled;
                }
                drop(inner);
                self.condvar.notify_all();
                Ok(())
            }
            Some(QueryStatus::Running) => {
                if let Some(record) = inner.records.get_mut(&id) {
                    record.cancel_requested = true;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn release(&self, id: QueryId, status: QueryStatus) {
        let mut inner = self.inner.lock().expect("scheduler lock poisoned");
        if let Some(record) = inner.records.remove(&id) {
            if record.status == QueryStatus::Running {
                inner.current_memory_bytes = inner
                    .current_memory_bytes
                    .saturating_sub(record.estimated_memory_bytes);
                *inner.active_by_priority.get_mut(record.priority) -= 1;
                inner.active_count -= 1;
            }
            match status {
                QueryStatus::Completed => inner.completed_count += 1,
                QueryStatus::Failed | QueryStatus::TimedOut => inner.failed_count += 1,
                _ => {}
            }
        }
        let now = Instant::now();
        dispatch(&mut inner, &self.config, now);
        drop(inner);
        self.condvar.notify_all();
    }

    pub fn resource_usage(&self) -> ResourceUsageSnapshot {
        let inner = self.inner.lock().expect("scheduler lock poisoned");
        let mut queued_by_priority = PriorityCounts::default();
        for id in &inner.queue {
            if let Some(record) = inner.records.get(id) {
                *queued_by_priority.get_mut(record.priority) += 1;
            }
        }
        let average_queue_wait = if inner.wait_time_samples == 0 {
            Duration::ZERO
        } else {
            inner.wait_time_total / inner.wait_time_samples as u32
        };
        let stuck_query_count = inner
            .records
            .values()
            .filter(|r| r.status == QueryStatus::Running && r.cancel_requested)
            .count() as u64;
        let health = rollup_health(
            &self.config.alert_thresholds,
            inner.current_memory_bytes,
            self.config.max_memory_bytes,
            inner.queue.len(),
            stuck_query_count,
        );
        ResourceUsageSnapshot {
            current_memory_bytes: inner.current_memory_bytes,
            active_by_priority: inner.active_by_priority,
            queued_by_priority,
            average_queue_wait,
            completed_count: inner.completed_count,
            failed_count: inner.failed_count,
            stuck_query_count,
            health,
        }
    }
}

/// Admits as many queue-head entries as the predicate allows, in
/// `(scheduling_priority, enqueue order)` order, stopping at the first
/// entry that cannot yet be admitted. Called on submit and on every
/// release so a single release wakes at most the waiters it actually frees
/// room for.
fn dispatch(inner: &mut Inner, config: &SchedulerConfig, now: Instant) {
    let mut ordered: Vec<QueryId> = inner.queue.iter().copied().collect();
    ordered.sort_by_key(|id| {
        let record = &inner.records[id];
        (record.scheduling_priority.rank(), record.enqueued_at)
    });

    for id in ordered {
        let (priority, estimated_memory_bytes, estimated_complexity, wait) = {
            let record = &inner.records[&id];
            (
                record.priority,
                record.estimated_memory_bytes,
                record.estimated_complexity,
                record.wait_time(now),
            )
        };
        let admissible = inner.current_memory_bytes + estimated_memory_bytes
            <= config.max_memory_bytes
            && inner.active_count < config.max_concurrent_queries
            && inner.active_by_priority.get(priority) < config.per_priority_caps.get(priority)
            && estimated_complexity <= config.max_query_complexity;
        if !admissible {
            break;
        }

        inner.wait_time_total += wait;
        inner.wait_time_samples += 1;

        inner.current_memory_bytes += estimated_memory_bytes;
        *inner.active_by_priority.get_mut(priority) += 1;
        inner.active_count += 1;

        inner.queue.retain(|qid| *qid != id);
        let record = inner.records.get_mut(&id).expect("record present");
        record.status = QueryStatus::Running;
        record.running_since = Some(now);
    }
}

fn promote_starved(inner: &mut Inner, now: Instant, threshold: Duration) {
    for id in inner.queue.clone() {
        if let Some(record) = inner.records.get_mut(&id) {
            if record.wait_time(now) > threshold {
                record.scheduling_priority = record.scheduling_priority.promote();
            }
        }
    }
}

fn rollup_health(
    thresholds: &AlertThresholds,
    current_memory_bytes: u64,
    max_memory_bytes: u64,
    queue_depth: usize,
    stuck_query_count: u64,
) -> HealthStatus {
    if stuck_query_count > 0 {
        return HealthStatus::Critical;
    }
    let memory_percent = if max_memory_bytes == 0 {
        0.0
    } else {
        (current_memory_bytes as f64 / max_memory_bytes as f64) * 100.0
    };
    if memory_percent >= thresholds.memory_percent || queue_depth >= thresholds.queue_depth {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kusto_core::PriorityCounts as Caps;

    fn config(per_priority: Caps, global_cap: usize) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_queries: global_cap,
            max_memory_bytes: 1 << 30,
            max_query_complexity: 10_000,
            per_priority_caps: per_priority,
            default_query_timeout: Duration::from_secs(30),
            stuck_query_threshold: Duration::from_secs(60),
            monitoring_sample_interval: Duration::from_secs(5),
            alert_thresholds: AlertThresholds {
                memory_percent: 90.0,
                queue_depth: 1000,
            },
        }
    }

    #[test]
    fn admits_immediately_under_cap() {
        let sched = Scheduler::new(config(Caps { critical: 4, high: 4, normal: 4, low: 4 }, 8));
        let id = QueryId::now_v7();
        sched.submit(id, Priority::Normal, 1024, 10).unwrap();
        let guard = sched.admit(id, Duration::from_millis(100)).unwrap();
        guard.complete();
    }

    #[test]
    fn over_complexity_is_rejected_without_enqueueing() {
        let sched = Scheduler::new(config(Caps { critical: 1, high: 1, normal: 1, low: 1 }, 4));
        let id = QueryId::now_v7();
        let err = sched.submit(id, Priority::Normal, 1024, 1_000_000).unwrap_err();
        assert!(matches!(err, SchedulerError::ComplexityExceeded { .. }));
    }

    #[test]
    fn fourth_critical_query_queues_then_admits_on_release() {
        let sched = Scheduler::new(config(Caps { critical: 2, high: 2, normal: 2, low: 2 }, 8));
        let mut ids = Vec::new();
        for _ in 0..4 {
            let id = QueryId::now_v7();
            sched.submit(id, Priority::Critical, 1, 1).unwrap();
            ids.push(id);
        }
        let g0 = sched.admit(ids[0], Duration::from_millis(200)).unwrap();
        let g1 = sched.admit(ids[1], Duration::from_millis(200)).unwrap();

        let third_id = ids[2];
        std::thread::scope(|s| {
            let handle = s.spawn(|| sched.admit(third_id, Duration::from_millis(500)));
            std::thread::sleep(Duration::from_millis(20));
            g0.complete();
            let result = handle.join().unwrap();
            assert!(result.is_ok());
            result.unwrap().complete();
        });
        g1.complete();
    }

    #[test]
    fn queue_timeout_when_never_admissible() {
        let sched = Scheduler::new(config(Caps { critical: 0, high: 0, normal: 0, low: 0 }, 8));
        let id = QueryId::now_v7();
        sched.submit(id, Priority::Normal, 1, 1).unwrap();
        let err = sched.admit(id, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, SchedulerError::QueueTimeout));
    }

    #[test]
    fn cancelling_a_queued_query_unblocks_its_waiter() {
        let sched = Scheduler::new(config(Caps { critical: 0, high: 0, normal: 0, low: 0 }, 8));
        let id = QueryId::now_v7();
        sched.submit(id, Priority::Normal, 1, 1).unwrap();
        let sched_ref = &sched;
        let result = std::thread::scope(|s| {
            let handle = s.spawn(move || sched_ref.admit(id, Duration::from_secs(5)));
            std::thread::sleep(Duration::from_millis(20));
            sched_ref.cancel(id).unwrap();
            handle.join().unwrap()
        });
        assert!(matches!(result, Err(SchedulerError::Cancelled)));
    }

    #[test]
    fn resource_usage_reflects_active_counts() {
        let sched = Scheduler::new(config(Caps { critical: 4, high: 4, normal: 4, low: 4 }, 8));
        let id = QueryId::now_v7();
        sched.submit(id, Priority::High, 2048, 10).unwrap();
        let guard = sched.admit(id, Duration::from_millis(100)).unwrap();
        let usage = sched.resource_usage();
        assert_eq!(usage.active_by_priority.high, 1);
        assert_eq!(usage.current_memory_bytes, 2048);
        guard.complete();
        let usage = sched.resource_usage();
        assert_eq!(usage.active_by_priority.high, 0);
    }
}
