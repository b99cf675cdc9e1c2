//! Choosing between the direct-parse text and the two OCR passes.

use super::types::{ExtractionMode, OcrMetrics, PipelineResult, ScoreComparison};

/// A text together with its quality score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredText {
    pub text: String,
    pub metrics: OcrMetrics,
}

impl ScoredText {
    pub fn new(text: String, metrics: OcrMetrics) -> Self {
        Self { text, metrics }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Pick the final text from the parsed text, OCR over the original document,
/// and OCR over the preprocessed rebuild.
///
/// The enhanced rebuild wins whenever it scores at least as well as OCR over
/// the original. Otherwise any non-blank parsed text is preferred over the
/// plain OCR text.
pub fn arbitrate(
    base: ScoredText,
    enhanced_base: ScoredText,
    enhanced: ScoredText,
    page_count: u32,
) -> PipelineResult {
    let comparison = ScoreComparison {
        base_score: base.metrics.score,
        enhanced_score: Some(enhanced.metrics.score),
    };

    let (selected, mode) = if enhanced.metrics.score >= enhanced_base.metrics.score {
        (enhanced, ExtractionMode::Enhanced)
    } else {
        (enhanced_base, ExtractionMode::Base)
    };

    let chosen = if mode == ExtractionMode::Enhanced || base.is_blank() {
        selected
    } else {
        base
    };

    PipelineResult {
        text: chosen.text,
        mode,
        metrics: chosen.metrics,
        page_count: page_count.max(1),
        comparison,
    }
}
