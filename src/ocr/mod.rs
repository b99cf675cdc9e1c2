//! External OCR capability.
//!
//! The recognizer itself is a black box: it takes document bytes (a raw PDF
//! or a rebuilt image PDF) and returns text. Two implementations:
//!
//! - **DocumentIntelligenceClient**: prebuilt-read model over HTTP (OCR_ENDPOINT, OCR_API_KEY)
//! - **ScriptedOcrClient**: deterministic queued responses for tests and dry runs

mod api;
mod backend;
mod document_intelligence;
mod scripted;

pub use backend::{OcrClient, OcrError};
pub use document_intelligence::DocumentIntelligenceClient;
pub use scripted::ScriptedOcrClient;
