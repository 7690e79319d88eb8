//! Prometheus metrics for the extraction pipeline and fact checkers
//!
//! Call [`init_metrics`] once at application startup to register all
//! metrics. If initialization fails (or never happened), metric operations
//! become no-ops so the pipeline keeps working without observability.

use prometheus::{
    register_counter, register_counter_vec, Counter, CounterVec, Encoder, TextEncoder,
};
use std::sync::OnceLock;

/// Container for all pipeline metrics
struct PipelineMetrics {
    extraction_failures: CounterVec,
    linking_failures: CounterVec,
    store_operations: CounterVec,
    verdicts: CounterVec,
    updates_started: Counter,
    updates_failed: Counter,
}

/// Global storage for pipeline metrics
static PIPELINE_METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

/// Initialize all Prometheus metrics.
///
/// Should be called once at application startup; repeated calls are no-ops.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = PipelineMetrics {
        extraction_failures: register_counter_vec!(
            "verity_extraction_failures_total",
            "Open extraction service calls that degraded to an empty result",
            &["backend"]
        )?,
        linking_failures: register_counter_vec!(
            "verity_linking_failures_total",
            "Entity/relation linking service calls that degraded to no result",
            &["service"]
        )?,
        store_operations: register_counter_vec!(
            "verity_store_operations_total",
            "Knowledge graph store operations by kind",
            &["operation"]
        )?,
        verdicts: register_counter_vec!(
            "verity_fact_check_verdicts_total",
            "Fact check verdicts by strategy and verdict",
            &["strategy", "verdict"]
        )?,
        updates_started: register_counter!(
            "verity_updates_started_total",
            "Knowledge graph update runs started"
        )?,
        updates_failed: register_counter!(
            "verity_updates_failed_total",
            "Knowledge graph update runs that ended with an error"
        )?,
    };

    PIPELINE_METRICS.set(metrics).ok();
    Ok(())
}

/// Record a degraded open extraction call
pub fn record_extraction_failure(backend: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.extraction_failures.with_label_values(&[backend]).inc();
    }
}

/// Record a degraded entity/relation linking call
pub fn record_linking_failure(service: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.linking_failures.with_label_values(&[service]).inc();
    }
}

/// Record a knowledge graph store operation
pub fn record_store_operation(operation: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.store_operations.with_label_values(&[operation]).inc();
    }
}

/// Record a fact check verdict
pub fn record_verdict(strategy: &str, verdict: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.verdicts.with_label_values(&[strategy, verdict]).inc();
    }
}

/// Record the start of a knowledge graph update run
pub fn record_update_started() {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.updates_started.inc();
    }
}

/// Record a failed knowledge graph update run
pub fn record_update_failed() {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.updates_failed.inc();
    }
}

/// Render all registered metrics in Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
