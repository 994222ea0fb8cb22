//! The executor facade: the single entry point that orchestrates
//! parse -> validate -> optimize -> emit SQL -> admit -> run -> cache.

use crate::backend::Backend;
use crate::result::{ExecutionOptions, QueryResult};
use chrono::Utc;
use kusto_cache::{QueryFingerprint, ResultCache};
use kusto_core::{CacheConfig, ExecError, QueryId, ResourceUsageSnapshot, SchedulerConfig, Value};
use kusto_scheduler::Scheduler;
use kusto_sql::ExecutionContext;
use kusto_validator::SchemaProvider;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Don't cache results estimated to serialize past this many bytes —
/// mirrors the spec's "don't cache huge results" threshold.
pub const DEFAULT_MAX_CACHEABLE_ROWS: usize = 50_000;

pub struct Executor {
    schema: Arc<dyn SchemaProvider>,
    backend: Arc<dyn Backend>,
    scheduler: Scheduler,
    cache: ResultCache,
    cache_config: CacheConfig,
    max_cacheable_rows: usize,
}

impl Executor {
    pub fn new(
        schema: Arc<dyn SchemaProvider>,
        backend: Arc<dyn Backend>,
        scheduler_config: SchedulerConfig,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            schema,
            backend,
            scheduler: Scheduler::new(scheduler_config),
            cache: ResultCache::new(cache_config.clone()),
            cache_config,
            max_cacheable_rows: DEFAULT_MAX_CACHEABLE_ROWS,
        }
    }

    pub fn execute(
        &self,
        query_text: &str,
        tenant: &str,
        time_range: Option<(Value, Value)>,
        params: Vec<Value>,
        options: ExecutionOptions,
    ) -> Result<QueryResult, ExecError> {
        let started = Instant::now();
        let now = Utc::now();

        let time_range_text = time_range.as_ref().map(|(a, b)| {
            (a.canonical_text(), b.canonical_text())
        });
        let fingerprint = QueryFingerprint::new(
            query_text,
            tenant,
            time_range_text
                .as_ref()
                .map(|(a, b)| (a.as_str(), b.as_str())),
            &params,
        );

        if options.cache {
            if let Some(mut cached) = self.cache.get::<QueryResult>(fingerprint, now) {
                cached.cached = true;
                return Ok(cached);
            }
        }

        let (ast, diagnostics) = kusto_lang::parse(query_text);
        let Some(ast) = ast else {
            return Err(ExecError::Syntax(diagnostics));
        };
        if !diagnostics.is_empty() {
            return Err(ExecError::Syntax(diagnostics));
        }

        let semantic_diagnostics = kusto_validator::validate(&ast, self.schema.as_ref());
        if !semantic_diagnostics.is_empty() {
            return Err(ExecError::Semantic(semantic_diagnostics));
        }

        let table_row_count = self
            .schema
            .get_table(&ast.table.name)
            .and_then(|t| t.estimated_row_count);
        let (optimized, plan) = kusto_optimizer::optimize(ast, table_row_count);

        let ctx = ExecutionContext {
            tenant: tenant.to_string(),
            time_range,
            row_limit: None,
        };
        let (sql, sql_params) = kusto_sql::emit_sql(&optimized, &ctx)?;

        let estimated_memory_bytes = plan.estimated_output_rows().saturating_mul(256).max(1);
        let estimated_complexity = plan.total_cost().round().max(0.0) as u64;

        let id = QueryId::now_v7();
        self.scheduler
            .submit(id, options.priority, estimated_memory_bytes, estimated_complexity)?;
        let guard = self.scheduler.admit(id, options.timeout)?;

        if guard.is_cancel_requested() {
            guard.cancelled();
            return Err(ExecError::Resource(kusto_core::SchedulerError::Cancelled));
        }

        let deadline = Instant::now() + options.timeout;
        let outcome = self.backend.execute(&sql, &sql_params, deadline);

        let (columns, rows) = match outcome {
            Ok(result) => {
                guard.complete();
                result
            }
            Err(message) => {
                guard.fail();
                return Err(ExecError::Backend(message));
            }
        };

        let row_count = rows.len();
        let result = QueryResult {
            columns,
            rows,
            cached: false,
            row_count,
            elapsed: started.elapsed(),
        };

        if options.cache && row_count <= self.max_cacheable_rows {
            let ttl = chrono::Duration::from_std(self.cache_config.cache_default_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
            let _ = self.cache.put(fingerprint, &result, ttl, now);
        }

        Ok(result)
    }

    /// Best-effort: returns `true` if a matching query was found and a
    /// cancellation was recorded against it (queued or running).
    pub fn cancel(&self, id: QueryId) -> bool {
        self.scheduler.cancel(id).is_ok()
    }

    pub fn resource_usage(&self) -> ResourceUsageSnapshot {
        self.scheduler.resource_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FixedBackend;
    use crate::schema::StaticSchema;
    use kusto_core::{AlertThresholds, DataType, EvictionPolicy, PriorityCounts};
    use kusto_validator::{ColumnSchema, TableSchema};

    fn scheduler_config() -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_queries: 8,
            max_memory_bytes: 1 << 30,
            max_query_complexity: 10_000,
            per_priority_caps: PriorityCounts {
                critical: 4,
                high: 4,
                normal: 4,
                low: 4,
            },
            default_query_timeout: Duration::from_secs(5),
            stuck_query_threshold: Duration::from_secs(60),
            monitoring_sample_interval: Duration::from_secs(5),
            alert_thresholds: AlertThresholds {
                memory_percent: 90.0,
                queue_depth: 1000,
            },
        }
    }

    fn cache_config() -> CacheConfig {
        CacheConfig {
            cache_default_ttl: Duration::from_secs(60),
            cache_compression_threshold_bytes: 10 * 1024,
            cache_eviction_policy: EvictionPolicy::Lru,
            cache_max_bytes: 1 << 20,
        }
    }

    fn executor() -> Executor {
        let schema = Arc::new(StaticSchema::new(vec![TableSchema {
            name: "Users".to_string(),
            columns: vec![ColumnSchema {
                name: "age".to_string(),
                data_type: DataType::Integer,
            }],
            estimated_row_count: Some(1_000),
        }]));
        let backend = Arc::new(FixedBackend {
            columns: vec![("age".to_string(), DataType::Integer)],
            rows: vec![vec![Value::Integer(42)]],
        });
        Executor::new(schema, backend, scheduler_config(), cache_config())
    }

    #[test]
    fn executes_a_valid_query_and_returns_rows() {
        let exec = executor();
        let result = exec
            .execute(
                "Users | where age > 18",
                "tenant-a",
                None,
                vec![],
                ExecutionOptions::default(),
            )
            .unwrap();
        assert!(!result.cached);
        assert_eq!(result.row_count, 1);
    }

    #[test]
    fn second_identical_call_is_served_from_cache() {
        let exec = executor();
        exec.execute(
            "Users | where age > 18",
            "tenant-a",
            None,
            vec![],
            ExecutionOptions::default(),
        )
        .unwrap();
        let second = exec
            .execute(
                "Users | where age > 18",
                "tenant-a",
                None,
                vec![],
                ExecutionOptions::default(),
            )
            .unwrap();
        assert!(second.cached);
    }

    #[test]
    fn unknown_table_is_a_semantic_error() {
        let exec = executor();
        let err = exec
            .execute("Orders | where a > 1", "tenant-a", None, vec![], ExecutionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExecError::Semantic(_)));
    }

    #[test]
    fn syntax_error_is_reported() {
        let exec = executor();
        let err = exec
            .execute("Users | where", "tenant-a", None, vec![], ExecutionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExecError::Syntax(_)));
    }

    #[test]
    fn cancelling_an_unknown_id_returns_false() {
        let exec = executor();
        assert!(!exec.cancel(QueryId::now_v7()));
    }
}
