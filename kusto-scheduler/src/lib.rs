//! Admission control, priority queueing, and cancellation for concurrent
//! query execution against memory / concurrency / complexity ceilings.

mod record;
mod scheduler;

pub use record::{QueryResourceRecord, QueryStatus};
pub use scheduler::{AdmissionGuard, Scheduler};
