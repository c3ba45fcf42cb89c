//! Metrics module for Prometheus-based monitoring.
//!
//! Counts stage runs, rows written and model requests.
//!
//! # Example
//!
//! ```ignore
//! use rating_forge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! let collector = MetricsCollector::new();
//! collector.record_stage("call_llm_model", true, 12.5);
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use self::prometheus::{export_metrics, init_metrics};
