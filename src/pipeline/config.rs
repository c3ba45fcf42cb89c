//! Pipeline configuration loaded from a YAML file.
//!
//! The file names the cloud project, where the compiled definition is
//! written and uploaded, the parameter values of a run, and which backends
//! the stages use. A few environment variables override file values.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::definition::PipelineParams;
use crate::error::{LlmError, StorageError};
use crate::llm::vertex::{ACCESS_TOKEN_ENV, DEFAULT_LOCATION};
use crate::llm::VertexTextClient;
use crate::stages::{AnnotationMode, AnnotationOptions, IngestOptions, IngestSource, StageContext};
use crate::storage::gcs::DEFAULT_GCS_ENDPOINT;
use crate::storage::{GcsObjectStore, LocalObjectStore, ObjectLocation, ObjectStore};
use crate::warehouse::ParquetWarehouse;

/// Overrides `storage.local_root`.
pub const STORAGE_ROOT_ENV: &str = "RATING_FORGE_STORAGE_ROOT";
/// Overrides `annotate.max_workers`.
pub const MAX_WORKERS_ENV: &str = "RATING_FORGE_MAX_WORKERS";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Model client setup failed: {0}")]
    Llm(#[from] LlmError),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpConfig {
    pub project_id: String,
    /// Bucket holding the uploaded pipeline definition.
    pub storage_bucket_name: String,
    #[serde(default = "default_location")]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinesConfig {
    /// Local path of the compiled definition.
    pub pipeline_job_spec_path: PathBuf,
    /// `gs://` URI the compiled definition is uploaded to.
    pub gs_pipeline_job_spec_path: String,
    pub parameter_values: PipelineParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
    Gcs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory of the local backend.
    pub local_root: PathBuf,
    /// JSON API endpoint of the gcs backend.
    pub gcs_endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_root: PathBuf::from("./data/objects"),
            gcs_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Directory holding `<project>/<dataset>/<table>.parquet`.
    pub root: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/warehouse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Prediction API base URL; defaults to the regional endpoint.
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token.
    pub access_token_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_token_env: ACCESS_TOKEN_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub source: IngestSource,
    pub row_limit: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let options = IngestOptions::default();
        Self {
            source: options.source,
            row_limit: options.row_limit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Concurrent model calls; unset means one at a time.
    pub max_workers: Option<usize>,
    /// Per-call timeout; unset means wait indefinitely.
    pub call_timeout_secs: Option<u64>,
}

/// Full configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub gcp: GcpConfig,
    pub pipelines: PipelinesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

impl PipelineConfig {
    /// Read, apply environment overrides, and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without overrides or validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply environment variable overrides.
    ///
    /// # Environment Variables
    ///
    /// - `RATING_FORGE_STORAGE_ROOT`: local object store root
    /// - `RATING_FORGE_MAX_WORKERS`: concurrent model calls
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var(STORAGE_ROOT_ENV) {
            self.storage.local_root = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(MAX_WORKERS_ENV) {
            self.annotate.max_workers = Some(parse_env_value(&val, MAX_WORKERS_ENV)?);
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// The model identifier is not checked here; building the pipeline
    /// definition rejects it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("gcp.project_id", self.gcp.project_id.as_str()),
            ("gcp.storage_bucket_name", self.gcp.storage_bucket_name.as_str()),
            ("gcp.location", self.gcp.location.as_str()),
            (
                "pipelines.parameter_values.project_id",
                self.pipelines.parameter_values.project_id.as_str(),
            ),
            (
                "pipelines.parameter_values.gcs_bucket",
                self.pipelines.parameter_values.gcs_bucket.as_str(),
            ),
            (
                "pipelines.gs_pipeline_job_spec_path",
                self.pipelines.gs_pipeline_job_spec_path.as_str(),
            ),
            (
                "llm.access_token_env",
                self.llm.access_token_env.as_str(),
            ),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!("{} cannot be empty", key)));
            }
        }

        if self.pipelines.pipeline_job_spec_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "pipelines.pipeline_job_spec_path cannot be empty".to_string(),
            ));
        }

        ObjectLocation::parse(&self.pipelines.gs_pipeline_job_spec_path).map_err(|_| {
            ConfigError::ValidationFailed(format!(
                "pipelines.gs_pipeline_job_spec_path must be a gs://bucket/path URI, got '{}'",
                self.pipelines.gs_pipeline_job_spec_path
            ))
        })?;

        if self.annotate.max_workers == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "annotate.max_workers must be greater than 0".to_string(),
            ));
        }

        if self.annotate.call_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "annotate.call_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            source: self.ingest.source,
            row_limit: self.ingest.row_limit,
        }
    }

    pub fn annotation_options(&self) -> AnnotationOptions {
        AnnotationOptions {
            mode: match self.annotate.max_workers {
                Some(max_workers) => AnnotationMode::Bounded { max_workers },
                None => AnnotationMode::Sequential,
            },
            call_timeout: self.annotate.call_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Bearer token from the configured environment variable, if set.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(&self.llm.access_token_env).ok()
    }

    /// The object store selected by `storage.backend`.
    pub fn object_store(&self) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        Ok(match self.storage.backend {
            StorageBackend::Local => {
                tracing::debug!(root = %self.storage.local_root.display(), "Using local object store");
                Arc::new(LocalObjectStore::new(&self.storage.local_root))
            }
            StorageBackend::Gcs => {
                let store = GcsObjectStore::new(
                    self.storage
                        .gcs_endpoint
                        .clone()
                        .unwrap_or_else(|| DEFAULT_GCS_ENDPOINT.to_string()),
                    self.access_token(),
                )?;
                tracing::debug!(endpoint = %store.endpoint(), "Using GCS object store");
                Arc::new(store)
            }
        })
    }

    /// The model client for `llm.endpoint`, or the public endpoint of
    /// `gcp.location` when none is set.
    pub fn model_client(&self) -> Result<VertexTextClient, ConfigError> {
        let token = self.access_token();
        let client = match &self.llm.endpoint {
            Some(endpoint) => VertexTextClient::new(endpoint, &self.gcp.location, token, None)?,
            None => VertexTextClient::for_location(&self.gcp.location, token)?,
        };

        if !client.has_access_token() {
            tracing::warn!(
                var = %self.llm.access_token_env,
                "No access token set; model calls will be unauthenticated"
            );
        }
        tracing::debug!(api_base = %client.api_base(), "Model client ready");
        Ok(client)
    }

    /// Build the context every stage runs in.
    pub fn stage_context(&self) -> Result<StageContext, ConfigError> {
        Ok(StageContext::new(
            self.object_store()?,
            Arc::new(ParquetWarehouse::new(&self.warehouse.root)),
            Arc::new(self.model_client()?),
        )
        .with_ingest_options(self.ingest_options())
        .with_annotation_options(self.annotation_options()))
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
gcp:
  project_id: my-project
  storage_bucket_name: my-bucket
pipelines:
  pipeline_job_spec_path: scripts/pipeline_spec/pipeline_job.yaml
  gs_pipeline_job_spec_path: gs://my-bucket/pipeline_root/pipeline_job.yaml
  parameter_values:
    project_id: my-project
    llm_model: text-bison@001
    input_bq_table: movies.source
    output_bq_table: movies.ratings
    gcs_bucket: my-bucket
    gcs_path: data/input.csv
    llm_output_path: data/llm_output.csv
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = PipelineConfig::from_yaml_str(MINIMAL).expect("parse");
        assert_eq!(config.gcp.location, "us-central1");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.llm.access_token_env, "RATING_FORGE_ACCESS_TOKEN");
        assert_eq!(config.ingest.source, IngestSource::Sample);
        assert_eq!(config.ingest.row_limit, Some(10));
        assert_eq!(config.pipelines.parameter_values.llm_model, "text-bison@001");
        assert!(config.validate().is_ok());

        let options = config.annotation_options();
        assert_eq!(options.mode, AnnotationMode::Sequential);
        assert_eq!(options.call_timeout, None);
    }

    #[test]
    fn test_full_config() {
        let yaml = format!(
            "{}{}",
            MINIMAL,
            r#"
storage:
  backend: gcs
  gcs_endpoint: http://localhost:4443
warehouse:
  root: /tmp/warehouse
ingest:
  source: warehouse
  row_limit: 50
annotate:
  max_workers: 4
  call_timeout_secs: 30
"#
        );
        let config = PipelineConfig::from_yaml_str(&yaml).expect("parse");
        assert_eq!(config.storage.backend, StorageBackend::Gcs);
        assert_eq!(config.warehouse.root, PathBuf::from("/tmp/warehouse"));
        assert_eq!(config.ingest_options().source, IngestSource::Warehouse);
        assert_eq!(config.ingest_options().row_limit, Some(50));

        let options = config.annotation_options();
        assert_eq!(options.mode, AnnotationMode::Bounded { max_workers: 4 });
        assert_eq!(options.call_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validation_empty_project() {
        let mut config = PipelineConfig::from_yaml_str(MINIMAL).expect("parse");
        config.gcp.project_id = String::new();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("gcp.project_id"));
    }

    #[test]
    fn test_validation_empty_parameter_project() {
        let mut config = PipelineConfig::from_yaml_str(MINIMAL).expect("parse");
        config.pipelines.parameter_values.project_id = "  ".to_string();
        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("pipelines.parameter_values.project_id"));
    }

    #[test]
    fn test_model_client_endpoint() {
        let mut config = PipelineConfig::from_yaml_str(MINIMAL).expect("parse");
        config.llm.access_token_env = "RATING_FORGE_TEST_TOKEN_UNSET".to_string();

        let client = config.model_client().expect("client");
        assert_eq!(client.api_base(), "https://us-central1-aiplatform.googleapis.com");
        assert!(!client.has_access_token());

        config.llm.endpoint = Some("http://localhost:8085/".to_string());
        let client = config.model_client().expect("client");
        assert_eq!(client.api_base(), "http://localhost:8085");
    }

    #[test]
    fn test_validation_bad_upload_uri() {
        let mut config = PipelineConfig::from_yaml_str(MINIMAL).expect("parse");
        config.pipelines.gs_pipeline_job_spec_path = "/local/path.yaml".to_string();
        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("gs_pipeline_job_spec_path"));
    }

    #[test]
    fn test_validation_zero_workers() {
        let mut config = PipelineConfig::from_yaml_str(MINIMAL).expect("parse");
        config.annotate.max_workers = Some(0);
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("max_workers"));
    }

    #[test]
    fn test_missing_section_is_error() {
        let result = PipelineConfig::from_yaml_str("gcp:\n  project_id: p\n  storage_bucket_name: b\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, MINIMAL).expect("write");
        let config = PipelineConfig::from_file(&path).expect("load");
        assert_eq!(config.gcp.project_id, "my-project");
    }

    #[test]
    fn test_stage_context_from_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = PipelineConfig::from_yaml_str(MINIMAL).expect("parse");
        config.storage.local_root = dir.path().join("objects");
        config.warehouse.root = dir.path().join("warehouse");

        let ctx = config.stage_context().expect("context");
        assert_eq!(ctx.ingest.row_limit, Some(10));
    }

    #[test]
    fn test_parse_env_value() {
        let workers: usize = parse_env_value("8", "KEY").expect("parse");
        assert_eq!(workers, 8);
        assert!(parse_env_value::<usize>("many", "KEY").is_err());
    }
}
