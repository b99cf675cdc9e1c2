//! Values passed between pipeline stages and handed back to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which extraction pass produced a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Direct parse, or OCR over the untouched document.
    Base,
    /// OCR over rendered and cleaned-up pages.
    Enhanced,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Base => "base",
            ExtractionMode::Enhanced => "enhanced",
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the selector picked its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    ForceEnhanced,
    LowDensityOrNoisy,
    TextualPdf,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::ForceEnhanced => "force_enhanced",
            DecisionReason::LowDensityOrNoisy => "low_density_or_noisy",
            DecisionReason::TextualPdf => "textual_pdf",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cheap signals the selector looked at.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalMetrics {
    /// Trimmed characters per page.
    pub density: f64,
    /// Share of trimmed characters outside printable ASCII, in [0, 1].
    pub weird_ratio: f64,
}

/// Outcome of strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub mode: ExtractionMode,
    pub reason: DecisionReason,
    pub signal_metrics: SignalMetrics,
}

/// Quality score of an extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrMetrics {
    /// Confidence in [0, 1].
    pub score: f64,
    /// Diagnostic reason codes, in the order they were detected.
    pub reasons: Vec<String>,
}

impl OcrMetrics {
    pub fn empty() -> Self {
        Self {
            score: 0.0,
            reasons: vec!["empty_text".to_string()],
        }
    }
}

/// Scores of the candidates the arbiter compared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComparison {
    pub base_score: f64,
    /// Absent when the enhanced pass never produced a scored text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_score: Option<f64>,
}

/// Final output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Selected text. Never empty.
    pub text: String,
    pub mode: ExtractionMode,
    pub metrics: OcrMetrics,
    /// Pages in the source document, at least 1.
    pub page_count: u32,
    pub comparison: ScoreComparison,
}
