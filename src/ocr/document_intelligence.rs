//! Document Intelligence (prebuilt-read) OCR client.
//!
//! Submits whole documents to the analyze endpoint, then polls the
//! operation until it finishes. Requires OCR_ENDPOINT and OCR_API_KEY.
//!
//! Rate limiting:
//! - Retries 429 responses with exponential backoff
//! - Respects Retry-After header from the service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::api;
use super::backend::{OcrClient, OcrError};
use crate::config::OcrApiConfig;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";
const CLIENT_NAME: &str = "document-intelligence";

/// OCR client for the Document Intelligence analyze API.
pub struct DocumentIntelligenceClient {
    config: OcrApiConfig,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest {
    #[serde(rename = "base64Source")]
    base64_source: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeOperation {
    status: String,
    #[serde(rename = "analyzeResult")]
    analyze_result: Option<AnalyzeResult>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl DocumentIntelligenceClient {
    /// Create a client from configuration.
    ///
    /// Construction never fails on missing credentials; `analyze` reports
    /// [`OcrError::ConfigMissing`] instead so callers can still run the
    /// base path without OCR configured.
    pub fn new(config: OcrApiConfig) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OcrError::Failed(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    /// Resolve the endpoint and key, or fail without touching the network.
    fn credentials(&self) -> Result<(&str, &str), OcrError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| OcrError::ConfigMissing("OCR_ENDPOINT not set".to_string()))?;
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OcrError::ConfigMissing("OCR_API_KEY not set".to_string()))?;
        Ok((endpoint, key))
    }

    fn analyze_url(&self, endpoint: &str) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            endpoint.trim_end_matches('/'),
            self.config.model,
            self.config.api_version
        )
    }

    /// Submit the document and return the operation URL to poll.
    async fn submit(&self, endpoint: &str, key: &str, document: &[u8]) -> Result<String, OcrError> {
        let url = self.analyze_url(endpoint);
        let request = AnalyzeRequest {
            base64_source: api::encode_base64(document),
        };

        let http = &self.http;
        let url = url.as_str();
        let request = &request;
        let response = api::retry_on_rate_limit(CLIENT_NAME, || async move {
            http.post(url)
                .header(KEY_HEADER, key)
                .json(request)
                .send()
                .await
                .map_err(api::network_error)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Failed(format!(
                "analyze request rejected ({}): {}",
                status, body
            )));
        }

        response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| OcrError::Failed("response missing Operation-Location".to_string()))
    }

    /// Poll the operation until it succeeds or fails.
    async fn poll(&self, operation_url: &str, key: &str) -> Result<String, OcrError> {
        let http = &self.http;
        for attempt in 0..self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval()).await;

            let response = api::retry_on_rate_limit(CLIENT_NAME, || async move {
                http.get(operation_url)
                    .header(KEY_HEADER, key)
                    .send()
                    .await
                    .map_err(api::network_error)
            })
            .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(OcrError::Failed(format!(
                    "result poll failed ({}): {}",
                    status, body
                )));
            }

            let operation: AnalyzeOperation = response
                .json()
                .await
                .map_err(|e| OcrError::Failed(format!("Failed to parse response: {}", e)))?;

            match operation.status.as_str() {
                "succeeded" => {
                    let content = operation
                        .analyze_result
                        .and_then(|r| r.content)
                        .unwrap_or_default();
                    if content.trim().is_empty() {
                        return Err(OcrError::Empty);
                    }
                    return Ok(content);
                }
                "failed" => {
                    let message = operation
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Err(OcrError::Failed(format!("analysis failed: {}", message)));
                }
                other => debug!("{}: poll {} status {}", CLIENT_NAME, attempt + 1, other),
            }
        }

        Err(OcrError::Failed(format!(
            "analysis did not finish after {} polls",
            self.config.max_polls
        )))
    }
}

#[async_trait]
impl OcrClient for DocumentIntelligenceClient {
    fn name(&self) -> &str {
        CLIENT_NAME
    }

    fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    fn availability_hint(&self) -> String {
        match self.credentials() {
            Ok((endpoint, _)) => format!("Document Intelligence at {}", endpoint),
            Err(e) => format!("{} (set OCR_ENDPOINT and OCR_API_KEY)", e),
        }
    }

    async fn analyze(&self, document: &[u8]) -> Result<String, OcrError> {
        let (endpoint, key) = self.credentials()?;
        info!(
            "{}: submitting {} bytes to {}",
            CLIENT_NAME,
            document.len(),
            self.config.model
        );
        let operation_url = self.submit(endpoint, key, document).await?;
        self.poll(&operation_url, key).await
    }
}
