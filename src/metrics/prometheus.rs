//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by rating-forge and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all rating-forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total stage executions, labeled by stage and status.
pub static STAGE_RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Stage execution duration in seconds, labeled by stage.
pub static STAGE_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Rows written by each stage.
pub static ROWS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Total model API requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Model API request latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Calling this more than once is harmless: later calls build a fresh
/// registry but the statics keep the first one.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let stage_runs_total = CounterVec::new(
        Opts::new("rating_forge_stage_runs_total", "Total stage executions"),
        &["stage", "status"],
    )?;

    let stage_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "rating_forge_stage_duration_seconds",
            "Stage execution duration in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["stage"],
    )?;

    let rows_total = CounterVec::new(
        Opts::new("rating_forge_rows_total", "Rows written by each stage"),
        &["stage"],
    )?;

    let llm_requests_total = CounterVec::new(
        Opts::new("rating_forge_llm_requests_total", "Total model API requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "rating_forge_llm_latency_seconds",
            "Model API request latency in seconds",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["model"],
    )?;

    registry.register(Box::new(stage_runs_total.clone()))?;
    registry.register(Box::new(stage_duration.clone()))?;
    registry.register(Box::new(rows_total.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;

    // Already-set statics mean a previous call won; keep those.
    let _ = REGISTRY.set(registry);
    let _ = STAGE_RUNS_TOTAL.set(stage_runs_total);
    let _ = STAGE_DURATION.set(stage_duration);
    let _ = ROWS_TOTAL.set(rows_total);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when the registry has not been
/// initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
