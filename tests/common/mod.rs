//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rating_forge::llm::{GenerationRequest, GenerationResponse, TextGenerator};
use rating_forge::pipeline::PipelineParams;
use rating_forge::stages::StageContext;
use rating_forge::storage::LocalObjectStore;
use rating_forge::warehouse::ParquetWarehouse;
use rating_forge::LlmError;

/// Returns the same text for every prompt and counts calls.
pub struct FixedGenerator {
    text: String,
    pub calls: AtomicUsize,
}

impl FixedGenerator {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenerationResponse {
            text: self.text.clone(),
            blocked: false,
        })
    }
}

/// Fails every call.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        Err(LlmError::ApiError {
            code: 503,
            message: "model unavailable".to_string(),
        })
    }
}

/// Fails for prompts mentioning `title`, answers `text` otherwise.
pub struct FailOnTitle {
    pub title: &'static str,
    pub text: &'static str,
}

#[async_trait]
impl TextGenerator for FailOnTitle {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        if request.prompt.contains(self.title) {
            return Err(LlmError::RateLimited("quota exhausted".to_string()));
        }
        Ok(GenerationResponse {
            text: self.text.to_string(),
            blocked: false,
        })
    }
}

/// Answers `text` and records the project of every request.
pub struct RecordingGenerator {
    text: String,
    projects: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            projects: Mutex::new(Vec::new()),
        }
    }

    pub fn projects(&self) -> Vec<String> {
        self.projects.lock().expect("lock").clone()
    }
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.projects.lock().expect("lock").push(request.project_id);
        Ok(GenerationResponse {
            text: self.text.clone(),
            blocked: false,
        })
    }
}

/// Stalls for prompts mentioning `title`, answers `text` otherwise.
pub struct StallOnTitle {
    pub title: &'static str,
    pub text: &'static str,
}

#[async_trait]
impl TextGenerator for StallOnTitle {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        if request.prompt.contains(self.title) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(GenerationResponse {
            text: self.text.to_string(),
            blocked: false,
        })
    }
}

pub fn params(model: &str) -> PipelineParams {
    PipelineParams {
        project_id: "test-project".to_string(),
        llm_model: model.to_string(),
        input_bq_table: "movielens.movies".to_string(),
        output_bq_table: "movielens.movie_ratings".to_string(),
        gcs_bucket: "pipeline-bucket".to_string(),
        gcs_path: "data/input.csv".to_string(),
        llm_output_path: "data/llm_output.csv".to_string(),
    }
}

/// A context backed by a local object store and parquet warehouse under `root`.
pub fn context(root: &Path, generator: Arc<dyn TextGenerator>) -> StageContext {
    StageContext::new(
        Arc::new(LocalObjectStore::new(root.join("objects"))),
        Arc::new(ParquetWarehouse::new(root.join("warehouse"))),
        generator,
    )
}
