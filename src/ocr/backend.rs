//! OCR client abstraction.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from OCR clients.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Endpoint or credentials are not configured. Never retried.
    #[error("OCR not configured: {0}")]
    ConfigMissing(String),

    /// The call succeeded but the recognizer returned no text.
    #[error("OCR returned no content")]
    Empty,

    #[error("OCR request failed: {0}")]
    Network(String),

    #[error("Rate limited by {client}, retry after {retry_after_secs:?}s")]
    RateLimited {
        client: String,
        retry_after_secs: Option<u64>,
    },

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    /// Whether this error means the client can never succeed as configured.
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, OcrError::ConfigMissing(_))
    }
}

/// Trait for external OCR capabilities.
///
/// `analyze` receives a whole document (PDF bytes) and returns its text.
/// Implementations own their network retry policy.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Check if this client has what it needs to run (endpoint, key).
    fn is_configured(&self) -> bool;

    /// Get a description of what's needed to make this client usable.
    fn availability_hint(&self) -> String;

    /// Run OCR over a document.
    async fn analyze(&self, document: &[u8]) -> Result<String, OcrError>;

    /// Run OCR and reject whitespace-only output as [`OcrError::Empty`].
    async fn analyze_non_empty(&self, document: &[u8]) -> Result<String, OcrError> {
        let text = self.analyze(document).await?;
        if text.trim().is_empty() {
            return Err(OcrError::Empty);
        }
        Ok(text)
    }
}
