//! Run Metrics Collection
//!
//! Counters for external calls, cache traffic and per-stage timings across
//! one pipeline run. Thread-safe so fan-out workers can record concurrently.
//!
//! Each external operation (`generate`, `search`) also keeps a bounded window
//! of timing samples, summarized as count, success rate, mean, min, max, p95
//! and p99. Errors are counted by [`ReportError::kind`].
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = create_shared_metrics();
//! metrics.record_generation(&response);
//! metrics.record_stage("Plan queries", elapsed, true);
//! metrics.record_operation("search", elapsed, false);
//! let summary = metrics.summary();
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::ai::provider::LlmResponse;
use crate::types::ReportError;

/// Timing samples kept per operation; older samples are dropped first
const MAX_OPERATION_SAMPLES: usize = 1000;

// =============================================================================
// Metrics Collector
// =============================================================================

/// Thread-safe metrics collector for one run.
///
/// Counters are atomics; stage timings sit behind an RwLock.
pub struct MetricsCollector {
    run_id: String,
    start_time: Instant,
    /// Generation backend calls that reached the provider
    api_calls: AtomicU32,
    /// Search backend calls that reached the provider
    search_queries: AtomicU32,
    cache_hits: AtomicU32,
    cache_misses: AtomicU32,
    /// External calls that failed after retries
    errors: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
    stages: RwLock<Vec<StageMetrics>>,
    operations: RwLock<BTreeMap<String, VecDeque<OperationSample>>>,
    error_types: RwLock<BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, Copy)]
struct OperationSample {
    duration_ms: f64,
    succeeded: bool,
}

/// Timing for one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub name: String,
    pub duration_ms: u64,
    pub succeeded: bool,
}

/// Timing statistics for one kind of external operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub success_rate: f64,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl OperationStats {
    fn from_samples(samples: &VecDeque<OperationSample>) -> Self {
        let count = samples.len();
        let success_count = samples.iter().filter(|s| s.succeeded).count();

        let mut durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
        durations.sort_by(f64::total_cmp);

        let (mean_ms, min_ms, max_ms) = match (durations.first(), durations.last()) {
            (Some(&min), Some(&max)) => (durations.iter().sum::<f64>() / count as f64, min, max),
            _ => (0.0, 0.0, 0.0),
        };

        Self {
            count,
            success_count,
            failure_count: count - success_count,
            success_rate: if count > 0 {
                success_count as f64 / count as f64
            } else {
                0.0
            },
            mean_ms,
            min_ms,
            max_ms,
            p95_ms: percentile(&durations, 95.0),
            p99_ms: percentile(&durations, 99.0),
        }
    }
}

/// Linear-interpolated percentile over ascending `sorted` values
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let Some(&first) = sorted.first() else {
        return 0.0;
    };
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    match (sorted.get(lower), sorted.get(upper)) {
        (Some(&lo), Some(&hi)) => lo + (hi - lo) * (rank - lower as f64),
        _ => first,
    }
}

/// Summary statistics for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub run_id: String,
    pub total_duration_ms: u64,
    pub api_calls: u32,
    pub search_queries: u32,
    pub cache_hits: u32,
    pub cache_misses: u32,
    pub errors: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
    pub stages: Vec<StageMetrics>,
    /// Per-operation timing statistics keyed by operation name
    #[serde(default)]
    pub operations: BTreeMap<String, OperationStats>,
    /// Error counts keyed by error kind
    #[serde(default)]
    pub error_types: BTreeMap<String, u32>,
}

impl MetricsCollector {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time: Instant::now(),
            api_calls: AtomicU32::new(0),
            search_queries: AtomicU32::new(0),
            cache_hits: AtomicU32::new(0),
            cache_misses: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            stages: RwLock::new(Vec::new()),
            operations: RwLock::new(BTreeMap::new()),
            error_types: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Record a completed generation call
    pub fn record_generation(&self, response: &LlmResponse) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(response.usage.input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(response.usage.output_tokens as u64, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(response.timing.total_ms, Ordering::Relaxed);
    }

    /// Record a completed search call
    pub fn record_search(&self) {
        self.search_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an external call that failed after retries
    pub fn record_error(&self, error: &ReportError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *write_lock(&self.error_types, "error types")
            .entry(error.kind().to_string())
            .or_insert(0) += 1;
    }

    /// Record one external operation's wall time and outcome
    pub fn record_operation(&self, operation: &str, duration: Duration, succeeded: bool) {
        let mut operations = write_lock(&self.operations, "operations");
        let samples = operations.entry(operation.to_string()).or_default();
        if samples.len() == MAX_OPERATION_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(OperationSample {
            duration_ms: duration.as_nanos() as f64 / 1_000_000.0,
            succeeded,
        });
    }

    /// Record one stage's wall time and outcome
    pub fn record_stage(&self, name: impl Into<String>, duration: Duration, succeeded: bool) {
        write_lock(&self.stages, "stages").push(StageMetrics {
            name: name.into(),
            duration_ms: duration.as_millis() as u64,
            succeeded,
        });
    }

    /// Get current metrics snapshot
    pub fn summary(&self) -> MetricsSummary {
        let api_calls = self.api_calls.load(Ordering::Relaxed);
        let input_tokens = self.input_tokens.load(Ordering::Relaxed);
        let output_tokens = self.output_tokens.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let avg_latency = if api_calls > 0 {
            total_latency as f64 / api_calls as f64
        } else {
            0.0
        };

        let stages = read_lock(&self.stages, "stages").clone();
        let operations = read_lock(&self.operations, "operations")
            .iter()
            .map(|(name, samples)| (name.clone(), OperationStats::from_samples(samples)))
            .collect();
        let error_types = read_lock(&self.error_types, "error types").clone();

        MetricsSummary {
            run_id: self.run_id.clone(),
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            api_calls,
            search_queries: self.search_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            avg_latency_ms: avg_latency,
            stages,
            operations,
            error_types,
        }
    }
}

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::error!("Metrics {} RwLock poisoned on read, recovering", what);
        poisoned.into_inner()
    })
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::error!("Metrics {} RwLock poisoned, recovering", what);
        poisoned.into_inner()
    })
}

impl MetricsSummary {
    /// Cache hit rate in [0, 1]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Format summary for display
    pub fn display(&self) -> String {
        let mut text = format!(
            "Run: {}\n\
             Duration: {:.1}s\n\
             Generation Calls: {}\n\
             Search Queries: {}\n\
             Cache: {} hits / {} misses ({:.0}%)\n\
             Errors: {}\n\
             Tokens: {} (input: {}, output: {})\n\
             Avg Latency: {:.0}ms",
            self.run_id,
            self.total_duration_ms as f64 / 1000.0,
            self.api_calls,
            self.search_queries,
            self.cache_hits,
            self.cache_misses,
            self.cache_hit_rate() * 100.0,
            self.errors,
            self.total_tokens,
            self.input_tokens,
            self.output_tokens,
            self.avg_latency_ms,
        );

        for (name, stats) in &self.operations {
            text.push_str(&format!(
                "\n{}: {} calls, {:.0}% ok, mean {:.0}ms, p95 {:.0}ms, p99 {:.0}ms",
                name,
                stats.count,
                stats.success_rate * 100.0,
                stats.mean_ms,
                stats.p95_ms,
                stats.p99_ms,
            ));
        }
        if !self.error_types.is_empty() {
            let kinds: Vec<String> = self
                .error_types
                .iter()
                .map(|(kind, count)| format!("{}={}", kind, count))
                .collect();
            text.push_str(&format!("\nError Types: {}", kinds.join(", ")));
        }

        text
    }
}

// =============================================================================
// Shared Type
// =============================================================================

/// Shared metrics collector for pipeline stages
pub type SharedMetrics = Arc<MetricsCollector>;

/// Create a shared collector with a fresh run id
pub fn create_shared_metrics() -> SharedMetrics {
    Arc::new(MetricsCollector::new(uuid::Uuid::new_v4().to_string()))
}
