//! Deterministic OCR client that replays queued responses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::backend::{OcrClient, OcrError};

/// OCR client returning scripted responses in call order.
///
/// Queued responses are consumed first; once the queue is empty the fixed
/// response (if any) is returned for every further call.
#[derive(Default)]
pub struct ScriptedOcrClient {
    queue: Mutex<VecDeque<Result<String, OcrError>>>,
    fixed: Option<String>,
    calls: AtomicUsize,
    documents: Mutex<Vec<usize>>,
}

impl ScriptedOcrClient {
    /// Create a client with no responses. Every call fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client that answers every call with the same text.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            fixed: Some(text.into()),
            ..Self::default()
        }
    }

    /// Queue a successful response.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn then_error(self, error: OcrError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, response: Result<String, OcrError>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(response);
        }
    }

    /// Number of `analyze` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Byte length of each document passed to `analyze`, in call order.
    pub fn document_sizes(&self) -> Vec<usize> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OcrClient for ScriptedOcrClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "Scripted responses".to_string()
    }

    async fn analyze(&self, document: &[u8]) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut docs) = self.documents.lock() {
            docs.push(document.len());
        }

        let queued = self
            .queue
            .lock()
            .map_err(|_| OcrError::Failed("scripted queue poisoned".to_string()))?
            .pop_front();

        match (queued, &self.fixed) {
            (Some(response), _) => response,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(OcrError::Failed("no scripted response left".to_string())),
        }
    }
}
