//! Configuration surface for the scheduler and cache.
//!
//! Mirrors `caliber_core::CaliberConfig`'s stance: ALL values are required,
//! no defaults anywhere for operational knobs. Construction is always
//! explicit (no `from_env`); the core owns no process-wide state.

use crate::error::{ConfigError, KqlResult};
use crate::priority::PriorityCounts;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-priority concurrency caps, one entry per tier.
pub type PriorityCaps = PriorityCounts;

/// Thresholds that drive the scheduler's `healthy | warning | critical` rollup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Memory utilization percentage (0.0-100.0) at which the rollup turns `warning`.
    pub memory_percent: f64,
    /// Total queued-query count at which the rollup turns `warning`.
    pub queue_depth: usize,
}

/// Eviction policy for the result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    Lru,
    Lfu,
    Ttl,
}

/// Scheduler configuration: admission ceilings, timeouts, monitoring cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub max_concurrent_queries: usize,
    pub max_memory_bytes: u64,
    pub max_query_complexity: u64,
    pub per_priority_caps: PriorityCaps,
    pub default_query_timeout: Duration,
    pub stuck_query_threshold: Duration,
    pub monitoring_sample_interval: Duration,
    pub alert_thresholds: AlertThresholds,
}

impl SchedulerConfig {
    pub fn validate(&self) -> KqlResult<()> {
        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_queries".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.max_memory_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_memory_bytes".into(),
                value: "0".into(),
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        let sum_caps = self.per_priority_caps.critical
            + self.per_priority_caps.high
            + self.per_priority_caps.normal
            + self.per_priority_caps.low;
        if sum_caps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "per_priority_caps".into(),
                value: "0".into(),
                reason: "at least one tier must allow concurrency".into(),
            }
            .into());
        }
        if !(0.0..=100.0).contains(&self.alert_thresholds.memory_percent) {
            return Err(ConfigError::InvalidValue {
                field: "alert_thresholds.memory_percent".into(),
                value: self.alert_thresholds.memory_percent.to_string(),
                reason: "must be between 0 and 100".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// Cache configuration: capacity, freshness, and eviction policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub cache_default_ttl: Duration,
    pub cache_compression_threshold_bytes: u64,
    pub cache_eviction_policy: EvictionPolicy,
    pub cache_max_bytes: u64,
}

impl CacheConfig {
    pub fn validate(&self) -> KqlResult<()> {
        if self.cache_max_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_max_bytes".into(),
                value: "0".into(),
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_scheduler_config() -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_queries: 16,
            max_memory_bytes: 1 << 30,
            max_query_complexity: 10_000,
            per_priority_caps: PriorityCaps {
                critical: 4,
                high: 4,
                normal: 4,
                low: 4,
            },
            default_query_timeout: Duration::from_secs(30),
            stuck_query_threshold: Duration::from_secs(120),
            monitoring_sample_interval: Duration::from_secs(5),
            alert_thresholds: AlertThresholds {
                memory_percent: 85.0,
                queue_depth: 100,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_scheduler_config().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut cfg = valid_scheduler_config();
        cfg.max_concurrent_queries = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_memory_percent_is_rejected() {
        let mut cfg = valid_scheduler_config();
        cfg.alert_thresholds.memory_percent = 150.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_cache_bytes_is_rejected() {
        let cfg = CacheConfig {
            cache_default_ttl: Duration::from_secs(60),
            cache_compression_threshold_bytes: 10 * 1024,
            cache_eviction_policy: EvictionPolicy::Lru,
            cache_max_bytes: 0,
        };
        assert!(cfg.validate().is_err());
    }
}
