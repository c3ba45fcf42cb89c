//! Pipeline definition: the three stage nodes and their ordering edges.
//!
//! A definition is built from [`PipelineParams`], compiled to a YAML artifact
//! and loaded back for execution. Building fails before anything runs when
//! the requested model is not in the allow-list.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::StorageError;
use crate::llm::ModelId;
use crate::stages::{AnnotateArgs, ExportArgs, IngestArgs, StageKind, StageTask};

/// Name of the compiled pipeline.
pub const PIPELINE_NAME: &str = "movie-rating-pipeline";

/// Description stored in the compiled pipeline.
pub const PIPELINE_DESCRIPTION: &str = "calling llm model api to get movie rating";

/// Errors raised while building, compiling, loading or publishing a definition.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("llm model is not valid: '{0}'")]
    InvalidModel(String),

    #[error("Duplicate node '{0}'")]
    DuplicateNode(String),

    #[error("Node '{node}' runs after '{after}', which is not an earlier node")]
    InvalidEdge { node: String, after: String },

    #[error("Definition digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The seven string parameters threaded through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub project_id: String,
    pub llm_model: String,
    pub input_bq_table: String,
    pub output_bq_table: String,
    pub gcs_bucket: String,
    pub gcs_path: String,
    pub llm_output_path: String,
}

/// One stage invocation in the pipeline graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineNode {
    pub name: String,
    pub task: StageTask,
    /// Nodes that must complete before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}

impl PipelineNode {
    fn new(task: StageTask, after: Option<&PipelineNode>) -> Self {
        Self {
            name: task.kind().node_name().to_string(),
            task,
            after: after.map(|n| vec![n.name.clone()]).unwrap_or_default(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.task.kind()
    }
}

/// On-disk form of a compiled definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CompiledDefinition {
    pipeline_name: String,
    description: String,
    compiled_at: DateTime<Utc>,
    /// Hex SHA-256 of the YAML-encoded `nodes` section.
    digest: String,
    parameters: PipelineParams,
    nodes: Vec<PipelineNode>,
}

/// A validated movie-rating pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    name: String,
    description: String,
    params: PipelineParams,
    model: ModelId,
    nodes: Vec<PipelineNode>,
}

impl PipelineDefinition {
    /// Validate the model and declare `fetch-data -> call-llm-model ->
    /// post-processing-and-export-to-bq`.
    pub fn build(params: PipelineParams) -> Result<Self, PipelineError> {
        let model = validate_model(&params.llm_model)?;

        let fetch = PipelineNode::new(
            StageTask::FetchData(IngestArgs {
                project_id: params.project_id.clone(),
                input_table: params.input_bq_table.clone(),
                bucket: params.gcs_bucket.clone(),
                output_path: params.gcs_path.clone(),
            }),
            None,
        );
        let annotate = PipelineNode::new(
            StageTask::CallLlmModel(AnnotateArgs {
                project_id: params.project_id.clone(),
                model: model.clone(),
                bucket: params.gcs_bucket.clone(),
                input_path: params.gcs_path.clone(),
                output_path: params.llm_output_path.clone(),
            }),
            Some(&fetch),
        );
        let export = PipelineNode::new(
            StageTask::PostProcessingAndExportToBq(ExportArgs {
                project_id: params.project_id.clone(),
                output_table: params.output_bq_table.clone(),
                bucket: params.gcs_bucket.clone(),
                input_path: params.llm_output_path.clone(),
            }),
            Some(&annotate),
        );

        Ok(Self {
            name: PIPELINE_NAME.to_string(),
            description: PIPELINE_DESCRIPTION.to_string(),
            params,
            model,
            nodes: vec![fetch, annotate, export],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &ModelId {
        &self.model
    }

    /// Nodes in declaration (and execution) order.
    pub fn nodes(&self) -> &[PipelineNode] {
        &self.nodes
    }

    /// Render the definition as a YAML artifact.
    pub fn compile(&self) -> Result<String, PipelineError> {
        let compiled = CompiledDefinition {
            pipeline_name: self.name.clone(),
            description: self.description.clone(),
            compiled_at: Utc::now(),
            digest: nodes_digest(&self.nodes)?,
            parameters: self.params.clone(),
            nodes: self.nodes.clone(),
        };
        Ok(serde_yaml::to_string(&compiled)?)
    }

    /// Compile and write the artifact to `path`, creating parent directories.
    pub fn compile_to_file(&self, path: &Path) -> Result<(), PipelineError> {
        let yaml = self.compile()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, yaml)?;
        tracing::info!(path = %path.display(), pipeline = %self.name, "Pipeline definition compiled");
        Ok(())
    }

    /// Parse a compiled artifact, checking its digest, edges and model.
    pub fn load(yaml: &str) -> Result<Self, PipelineError> {
        let compiled: CompiledDefinition = serde_yaml::from_str(yaml)?;

        let actual = nodes_digest(&compiled.nodes)?;
        if actual != compiled.digest {
            return Err(PipelineError::DigestMismatch {
                expected: compiled.digest,
                actual,
            });
        }

        let model = validate_model(&compiled.parameters.llm_model)?;
        validate_edges(&compiled.nodes)?;

        Ok(Self {
            name: compiled.pipeline_name,
            description: compiled.description,
            params: compiled.parameters,
            model,
            nodes: compiled.nodes,
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, PipelineError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::load(&yaml)
    }
}

fn validate_model(model: &str) -> Result<ModelId, PipelineError> {
    ModelId::parse(model).map_err(|_| PipelineError::InvalidModel(model.to_string()))
}

/// Every `after` entry must name a node declared earlier; names are unique.
pub fn validate_edges(nodes: &[PipelineNode]) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for node in nodes {
        for dep in &node.after {
            if !seen.contains(dep.as_str()) {
                return Err(PipelineError::InvalidEdge {
                    node: node.name.clone(),
                    after: dep.clone(),
                });
            }
        }
        if !seen.insert(node.name.as_str()) {
            return Err(PipelineError::DuplicateNode(node.name.clone()));
        }
    }
    Ok(())
}

fn nodes_digest(nodes: &[PipelineNode]) -> Result<String, PipelineError> {
    let encoded = serde_yaml::to_string(nodes)?;
    Ok(hex::encode(Sha256::digest(encoded.as_bytes())))
}
