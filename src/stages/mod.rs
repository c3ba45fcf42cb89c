//! The three pipeline stages and the context they run in.
//!
//! # Stages
//!
//! 1. **fetch_data** ([`ingest`]): read the source rows, assign `prompt_id`,
//!    normalize titles, write the intermediate CSV.
//! 2. **call_llm_model** ([`annotate`]): ask the hosted model for a rating per
//!    row and add the `rating` column.
//! 3. **post_processing_and_export_to_bq** ([`export`]): project the final
//!    columns, normalize ratings, replace the destination table.
//!
//! Every stage receives an explicit [`StageContext`]; nothing is read from
//! process-wide state. [`StageTask`] maps a stage tag to its entry point.

pub mod annotate;
pub mod export;
pub mod ingest;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{StorageError, TableError, WarehouseError};
use crate::llm::{ModelId, TextGenerator};
use crate::metrics::MetricsCollector;
use crate::storage::ObjectStore;
use crate::warehouse::Warehouse;

pub use annotate::{AnnotationReport, Rating};
pub use export::{ExportReport, EXPORT_COLUMNS};
pub use ingest::IngestReport;

/// Errors that abort a stage.
///
/// Per-row model failures are not stage errors; they are recovered inside
/// the annotation stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),
}

/// Stage tags, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    FetchData,
    CallLlmModel,
    PostProcessingAndExportToBq,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [
        StageKind::FetchData,
        StageKind::CallLlmModel,
        StageKind::PostProcessingAndExportToBq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::FetchData => "fetch_data",
            StageKind::CallLlmModel => "call_llm_model",
            StageKind::PostProcessingAndExportToBq => "post_processing_and_export_to_bq",
        }
    }

    /// Node name used in pipeline definitions.
    pub fn node_name(&self) -> &'static str {
        match self {
            StageKind::FetchData => "fetch-data",
            StageKind::CallLlmModel => "call-llm-model",
            StageKind::PostProcessingAndExportToBq => "post-processing-and-export-to-bq",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where ingestion reads its rows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSource {
    /// The fixed three-row sample.
    #[default]
    Sample,
    /// The warehouse table named by the stage arguments.
    Warehouse,
}

/// Ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub source: IngestSource,
    /// Maximum rows read from a warehouse source.
    pub row_limit: Option<usize>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            source: IngestSource::Sample,
            row_limit: Some(10),
        }
    }
}

/// How the annotation stage issues model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotationMode {
    /// One call at a time, in row order.
    #[default]
    Sequential,
    /// Up to `max_workers` calls in flight; results keep row order.
    Bounded { max_workers: usize },
}

/// Annotation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotationOptions {
    pub mode: AnnotationMode,
    /// Per-call timeout. `None` waits for the model indefinitely.
    pub call_timeout: Option<Duration>,
}

/// Everything a stage needs, passed explicitly.
#[derive(Clone)]
pub struct StageContext {
    pub store: Arc<dyn ObjectStore>,
    pub warehouse: Arc<dyn Warehouse>,
    pub generator: Arc<dyn TextGenerator>,
    pub metrics: MetricsCollector,
    pub ingest: IngestOptions,
    pub annotation: AnnotationOptions,
}

impl StageContext {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        warehouse: Arc<dyn Warehouse>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            store,
            warehouse,
            generator,
            metrics: MetricsCollector::new(),
            ingest: IngestOptions::default(),
            annotation: AnnotationOptions::default(),
        }
    }

    pub fn with_ingest_options(mut self, options: IngestOptions) -> Self {
        self.ingest = options;
        self
    }

    pub fn with_annotation_options(mut self, options: AnnotationOptions) -> Self {
        self.annotation = options;
        self
    }
}

/// Arguments of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestArgs {
    /// Project that owns `dataset.table` names.
    pub project_id: String,
    /// Source table (used when the source is the warehouse).
    pub input_table: String,
    pub bucket: String,
    /// Intermediate object written by this stage.
    pub output_path: String,
}

/// Arguments of the annotation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotateArgs {
    /// Project the model calls are issued against.
    pub project_id: String,
    pub model: ModelId,
    pub bucket: String,
    pub input_path: String,
    pub output_path: String,
}

/// Arguments of the export stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArgs {
    pub project_id: String,
    /// Destination warehouse table.
    pub output_table: String,
    pub bucket: String,
    pub input_path: String,
}

/// A stage together with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "arguments", rename_all = "snake_case")]
pub enum StageTask {
    FetchData(IngestArgs),
    CallLlmModel(AnnotateArgs),
    PostProcessingAndExportToBq(ExportArgs),
}

/// Summary of a completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub stage: StageKind,
    /// Rows written by the stage.
    pub rows: usize,
    /// Rows whose model call failed (annotation only).
    pub failed_rows: usize,
}

impl StageTask {
    pub fn kind(&self) -> StageKind {
        match self {
            StageTask::FetchData(_) => StageKind::FetchData,
            StageTask::CallLlmModel(_) => StageKind::CallLlmModel,
            StageTask::PostProcessingAndExportToBq(_) => StageKind::PostProcessingAndExportToBq,
        }
    }

    /// Project the stage's calls and table names resolve against.
    pub fn project_id(&self) -> &str {
        match self {
            StageTask::FetchData(args) => &args.project_id,
            StageTask::CallLlmModel(args) => &args.project_id,
            StageTask::PostProcessingAndExportToBq(args) => &args.project_id,
        }
    }

    /// Run the stage to completion.
    pub async fn run(&self, ctx: &StageContext) -> Result<StageOutcome, StageError> {
        let kind = self.kind();
        let start = Instant::now();
        tracing::info!(stage = %kind, project_id = %self.project_id(), "Stage started");

        let result = match self {
            StageTask::FetchData(args) => ingest::run_ingest(ctx, args)
                .await
                .map(|r| (r.rows, 0)),
            StageTask::CallLlmModel(args) => annotate::run_annotate(ctx, args)
                .await
                .map(|r| (r.rows, r.failed_rows.len())),
            StageTask::PostProcessingAndExportToBq(args) => export::run_export(ctx, args)
                .await
                .map(|r| (r.rows, 0)),
        };

        let elapsed = start.elapsed();
        ctx.metrics
            .record_stage(kind.as_str(), result.is_ok(), elapsed.as_secs_f64());

        match result {
            Ok((rows, failed_rows)) => {
                ctx.metrics.record_rows(kind.as_str(), rows);
                tracing::info!(
                    stage = %kind,
                    rows = rows,
                    failed_rows = failed_rows,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Stage completed"
                );
                Ok(StageOutcome {
                    stage: kind,
                    rows,
                    failed_rows,
                })
            }
            Err(e) => {
                tracing::error!(stage = %kind, error = %e, "Stage failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_names() {
        let names: Vec<_> = StageKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["fetch_data", "call_llm_model", "post_processing_and_export_to_bq"]
        );
        assert_eq!(StageKind::CallLlmModel.node_name(), "call-llm-model");
    }

    #[test]
    fn test_stage_task_serialization() {
        let task = StageTask::CallLlmModel(AnnotateArgs {
            project_id: "proj".to_string(),
            model: ModelId::parse("text-bison").expect("model"),
            bucket: "bucket".to_string(),
            input_path: "data/input.csv".to_string(),
            output_path: "data/llm_output.csv".to_string(),
        });

        let yaml = serde_yaml::to_string(&task).expect("serialize");
        assert!(yaml.contains("stage: call_llm_model"));
        assert!(yaml.contains("model: text-bison"));

        let back: StageTask = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, task);
        assert_eq!(back.kind(), StageKind::CallLlmModel);
    }

    #[test]
    fn test_stage_task_rejects_unknown_model() {
        let yaml = "stage: call_llm_model\narguments:\n  project_id: p\n  model: gpt-unknown\n  bucket: b\n  input_path: i\n  output_path: o\n";
        let parsed: Result<StageTask, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }
}
