//! Request/response types and the text-generation seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::ModelId;
use crate::error::LlmError;

/// Decoding configuration sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    /// Maximum number of tokens to generate.
    pub max_output_tokens: u32,
    /// Sampling temperature. Low values keep answers close to deterministic.
    pub temperature: f64,
    /// Nucleus sampling parameter (0.0 - 1.0).
    pub top_p: f64,
    /// Top-k sampling parameter.
    pub top_k: u32,
}

impl DecodingParams {
    /// The fixed parameters used for rating prompts.
    pub const RATING: DecodingParams = DecodingParams {
        max_output_tokens: 256,
        temperature: 0.1,
        top_p: 0.5,
        top_k: 20,
    };
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self::RATING
    }
}

/// A single text-generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Project the model is billed to.
    pub project_id: String,
    pub model: ModelId,
    pub prompt: String,
    pub parameters: DecodingParams,
}

impl GenerationRequest {
    /// Create a request with the default rating parameters.
    pub fn new(project_id: impl Into<String>, model: ModelId, prompt: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            model,
            prompt: prompt.into(),
            parameters: DecodingParams::default(),
        }
    }
}

/// Response from a text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    /// Full generated text.
    pub text: String,
    /// Whether the service flagged the output as blocked.
    pub blocked: bool,
}

/// Trait for hosted models that turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}
