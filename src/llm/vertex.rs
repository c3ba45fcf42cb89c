//! Client for hosted text models on Vertex AI.
//!
//! Calls the `:predict` endpoint of a Google publisher model. The access token
//! is passed in as-is; this client never resolves credentials itself.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::{DecodingParams, GenerationRequest, GenerationResponse, TextGenerator};
use crate::error::LlmError;

/// Region the models are served from.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Default environment variable holding the bearer token.
pub const ACCESS_TOKEN_ENV: &str = "RATING_FORGE_ACCESS_TOKEN";

/// Client for the Vertex AI prediction API.
pub struct VertexTextClient {
    /// Base URL, e.g. `https://us-central1-aiplatform.googleapis.com`.
    api_base: String,
    location: String,
    access_token: Option<String>,
    http_client: Client,
}

impl VertexTextClient {
    /// Create a client with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL of the regional endpoint (or an emulator)
    /// * `location` - Region segment used in the resource path
    /// * `access_token` - Optional OAuth bearer token
    /// * `timeout` - Optional HTTP timeout; `None` waits indefinitely
    pub fn new(
        api_base: impl Into<String>,
        location: impl Into<String>,
        access_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            location: location.into(),
            access_token,
            http_client,
        })
    }

    /// Create a client for the public regional endpoint of `location`.
    pub fn for_location(location: &str, access_token: Option<String>) -> Result<Self, LlmError> {
        Self::new(default_api_base(location), location, access_token, None)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    fn predict_url(&self, project_id: &str, model: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.api_base, project_id, self.location, model
        )
    }
}

/// Public regional endpoint for `location`.
pub fn default_api_base(location: &str) -> String {
    format!("https://{}-aiplatform.googleapis.com", location)
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    temperature: f64,
    max_output_tokens: u32,
    top_p: f64,
    top_k: u32,
}

impl From<DecodingParams> for PredictParameters {
    fn from(p: DecodingParams) -> Self {
        Self {
            temperature: p.temperature,
            max_output_tokens: p.max_output_tokens,
            top_p: p.top_p,
            top_k: p.top_k,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    content: String,
    #[serde(default)]
    safety_attributes: Option<SafetyAttributes>,
}

#[derive(Debug, Deserialize)]
struct SafetyAttributes {
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Fields kept for complete API error deserialization
struct ApiErrorDetail {
    message: String,
    status: Option<String>,
}

#[async_trait]
impl TextGenerator for VertexTextClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let url = self.predict_url(&request.project_id, request.model.as_str());
        let body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: &request.prompt,
            }],
            parameters: request.parameters.into(),
        };

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(ref token) = self.access_token {
            http_request = http_request.bearer_auth(token);
        }

        let http_response = http_request
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|parsed| parsed.error.message)
                .unwrap_or(error_text);

            if status_code == 429 {
                return Err(LlmError::RateLimited(message));
            }
            return Err(LlmError::ApiError {
                code: status_code,
                message,
            });
        }

        let response: PredictResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse predict response: {}", e)))?;

        let prediction = response
            .predictions
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        Ok(GenerationResponse {
            text: prediction.content,
            blocked: prediction
                .safety_attributes
                .map(|s| s.blocked)
                .unwrap_or(false),
        })
    }
}
