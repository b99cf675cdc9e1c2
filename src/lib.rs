//! medocr - OCR decision pipeline for scanned legal-medical PDFs.
//!
//! Decides whether a document needs image OCR at all, renders and cleans up
//! page images when it does, scores both extraction paths and arbitrates the
//! winner. A separate line-level hardening pass cleans stored OCR line maps.

pub mod config;
pub mod hardening;
pub mod imaging;
pub mod ocr;
pub mod pdf;
pub mod pipeline;

pub use hardening::{HardeningResult, LexicalLine, ReviewFlag};
pub use ocr::{DocumentIntelligenceClient, OcrClient, OcrError, ScriptedOcrClient};
pub use pipeline::{
    ExtractionMode, OcrMetrics, OcrPipeline, PipelineError, PipelineOptions, PipelineResult,
    StrategyDecision,
};
