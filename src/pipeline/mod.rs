//! The OCR decision pipeline.
//!
//! A run moves through four states: the PDF is parsed directly, the
//! [`StrategySelector`] decides whether image OCR is warranted, the enhanced
//! pass runs if so, and the candidates are arbitrated into one
//! [`PipelineResult`].

mod arbitrate;
mod orchestrator;
mod quality;
mod selector;
mod types;

pub use arbitrate::{arbitrate, ScoredText};
pub use orchestrator::{OcrPipeline, PipelineError, PipelineOptions, MIN_BASE_TEXT_CHARS};
pub use quality::QualityScorer;
pub use selector::{StrategySelector, MAX_TEXTUAL_SIZE_MB, MAX_WEIRD_RATIO, MIN_DENSITY};
pub use types::{
    DecisionReason, ExtractionMode, OcrMetrics, PipelineResult, ScoreComparison, SignalMetrics,
    StrategyDecision,
};
