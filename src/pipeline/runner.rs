//! Local executor for pipeline definitions.
//!
//! Nodes run one at a time in declaration order. A node starts only after
//! every node it lists in `after` has succeeded; the first failure aborts the
//! run and the remaining nodes are reported as skipped.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::definition::{validate_edges, PipelineDefinition, PipelineError};
use crate::stages::{StageContext, StageError, StageKind};

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The definition failed validation; no node ran.
    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(#[from] PipelineError),

    /// A node failed; later nodes were skipped.
    #[error("Node '{node}' failed: {source}")]
    NodeFailed {
        node: String,
        summary: Box<RunSummary>,
        #[source]
        source: StageError,
    },
}

/// Final state of one node in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Per-node record of a run.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRun {
    pub name: String,
    pub stage: StageKind,
    pub status: NodeStatus,
    pub rows: usize,
    pub failed_rows: usize,
    pub duration_ms: u64,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub started_at: DateTime<Utc>,
    pub nodes: Vec<NodeRun>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.nodes.iter().all(|n| n.status == NodeStatus::Succeeded)
    }
}

/// Runs pipeline definitions against a [`StageContext`].
#[derive(Debug, Default, Clone)]
pub struct PipelineRunner;

impl PipelineRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute every node of `definition` in order.
    pub async fn run(
        &self,
        definition: &PipelineDefinition,
        ctx: &StageContext,
    ) -> Result<RunSummary, RunError> {
        validate_edges(definition.nodes())?;

        let mut summary = RunSummary {
            run_id: Uuid::new_v4(),
            pipeline_name: definition.name().to_string(),
            started_at: Utc::now(),
            nodes: Vec::with_capacity(definition.nodes().len()),
        };
        tracing::info!(
            run_id = %summary.run_id,
            pipeline = %summary.pipeline_name,
            nodes = definition.nodes().len(),
            "Pipeline run started"
        );

        let mut completed: HashSet<&str> = HashSet::new();
        let mut failure: Option<(String, StageError)> = None;

        for node in definition.nodes() {
            let blocked = failure.is_some()
                || node.after.iter().any(|dep| !completed.contains(dep.as_str()));
            if blocked {
                tracing::warn!(node = %node.name, "Skipping node");
                summary.nodes.push(NodeRun {
                    name: node.name.clone(),
                    stage: node.kind(),
                    status: NodeStatus::Skipped,
                    rows: 0,
                    failed_rows: 0,
                    duration_ms: 0,
                });
                continue;
            }

            let start = Instant::now();
            let result = node.task.run(ctx).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    completed.insert(node.name.as_str());
                    summary.nodes.push(NodeRun {
                        name: node.name.clone(),
                        stage: outcome.stage,
                        status: NodeStatus::Succeeded,
                        rows: outcome.rows,
                        failed_rows: outcome.failed_rows,
                        duration_ms,
                    });
                }
                Err(e) => {
                    summary.nodes.push(NodeRun {
                        name: node.name.clone(),
                        stage: node.kind(),
                        status: NodeStatus::Failed,
                        rows: 0,
                        failed_rows: 0,
                        duration_ms,
                    });
                    failure = Some((node.name.clone(), e));
                }
            }
        }

        match failure {
            Some((node, source)) => {
                tracing::error!(run_id = %summary.run_id, node = %node, "Pipeline run failed");
                Err(RunError::NodeFailed {
                    node,
                    summary: Box::new(summary),
                    source,
                })
            }
            None => {
                tracing::info!(run_id = %summary.run_id, "Pipeline run completed");
                Ok(summary)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::{GenerationRequest, GenerationResponse, TextGenerator};
    use crate::pipeline::definition::PipelineParams;
    use crate::storage::LocalObjectStore;
    use crate::warehouse::ParquetWarehouse;

    struct Unreachable;

    #[async_trait]
    impl TextGenerator for Unreachable {
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            Err(LlmError::RequestFailed("offline".to_string()))
        }
    }

    fn params() -> PipelineParams {
        PipelineParams {
            project_id: "proj".to_string(),
            llm_model: "text-bison".to_string(),
            input_bq_table: "movies.source".to_string(),
            output_bq_table: "not a table".to_string(),
            gcs_bucket: "bucket".to_string(),
            gcs_path: "data/input.csv".to_string(),
            llm_output_path: "data/llm_output.csv".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failed_node_aborts_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = StageContext::new(
            Arc::new(LocalObjectStore::new(dir.path().join("objects"))),
            Arc::new(ParquetWarehouse::new(dir.path().join("warehouse"))),
            Arc::new(Unreachable),
        );
        let definition = PipelineDefinition::build(params()).expect("build");

        let err = PipelineRunner::new()
            .run(&definition, &ctx)
            .await
            .unwrap_err();

        match err {
            RunError::NodeFailed { node, summary, .. } => {
                assert_eq!(node, "post-processing-and-export-to-bq");
                assert!(!summary.succeeded());
                let annotate = &summary.nodes[1];
                assert_eq!(annotate.name, "call-llm-model");
                assert_eq!(annotate.status, NodeStatus::Succeeded);
                assert_eq!(annotate.failed_rows, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
