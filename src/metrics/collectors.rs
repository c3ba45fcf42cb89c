//! Recording helpers over the raw Prometheus metrics.
//!
//! Recording is a no-op until `init_metrics()` has run, so library code can
//! record unconditionally and tests need no setup.

use super::prometheus::{
    LLM_LATENCY, LLM_REQUESTS_TOTAL, ROWS_TOTAL, STAGE_DURATION, STAGE_RUNS_TOTAL,
};

/// Metrics collector for stage and model-call measurements.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one stage execution.
    ///
    /// # Arguments
    ///
    /// * `stage` - Stage name (e.g., "fetch_data")
    /// * `success` - Whether the stage completed
    /// * `duration_secs` - Wall-clock duration in seconds
    pub fn record_stage(&self, stage: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(stage_runs) = STAGE_RUNS_TOTAL.get() {
            stage_runs.with_label_values(&[stage, status]).inc();
        }

        if let Some(stage_duration) = STAGE_DURATION.get() {
            stage_duration
                .with_label_values(&[stage])
                .observe(duration_secs);
        }

        tracing::trace!(
            stage = stage,
            status = status,
            duration_secs = duration_secs,
            "Recorded stage metric"
        );
    }

    /// Record the number of rows a stage wrote.
    pub fn record_rows(&self, stage: &str, rows: usize) {
        if let Some(rows_total) = ROWS_TOTAL.get() {
            rows_total.with_label_values(&[stage]).inc_by(rows as f64);
        }
    }

    /// Record one model API request.
    pub fn record_llm_request(&self, model: &str, success: bool, latency_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(llm_requests) = LLM_REQUESTS_TOTAL.get() {
            llm_requests.with_label_values(&[model, status]).inc();
        }

        if let Some(llm_latency) = LLM_LATENCY.get() {
            llm_latency
                .with_label_values(&[model])
                .observe(latency_secs);
        }

        tracing::trace!(
            model = model,
            status = status,
            latency_secs = latency_secs,
            "Recorded model request metric"
        );
    }
}
