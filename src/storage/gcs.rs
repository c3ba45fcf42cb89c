//! Cloud Storage client using the JSON API.
//!
//! Only simple media upload and media download are used. Credentials are not
//! resolved here: callers pass a ready OAuth access token.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::ObjectStore;
use crate::error::StorageError;

/// Public Cloud Storage endpoint.
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Error body returned by the JSON API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Object store backed by Google Cloud Storage.
pub struct GcsObjectStore {
    endpoint: String,
    access_token: Option<String>,
    http_client: Client,
}

impl GcsObjectStore {
    /// Create a client against `endpoint` (use [`DEFAULT_GCS_ENDPOINT`] outside tests).
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>) -> Result<Self, StorageError> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn download_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.endpoint,
            urlencoding::encode(bucket),
            urlencoding::encode(key)
        )
    }

    fn upload_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            urlencoding::encode(bucket),
            urlencoding::encode(key)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.access_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn api_error(response: reqwest::Response) -> StorageError {
    let code = response.status().as_u16();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());

    let message = serde_json::from_str::<ApiErrorResponse>(&text)
        .map(|parsed| parsed.error.message)
        .unwrap_or(text);

    StorageError::ApiError { code, message }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.download_url(bucket, key);
        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.upload_url(bucket, key);
        let size = data.len();
        let response = self
            .authorize(self.http_client.post(&url))
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        tracing::debug!(bucket = bucket, key = key, bytes = size, "Object uploaded");
        Ok(())
    }
}
