//! End-to-end extraction: direct parse, strategy decision, optional enhanced
//! OCR pass, arbitration.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::arbitrate::{arbitrate, ScoredText};
use super::quality::QualityScorer;
use super::selector::StrategySelector;
use super::types::{ExtractionMode, PipelineResult, ScoreComparison};
use crate::config::{PipelineConfig, DEFAULT_DPI, DEFAULT_PIPELINE_TIMEOUT_SECS};
use crate::imaging::ImagePreprocessor;
use crate::ocr::{OcrClient, OcrError};
use crate::pdf::{
    AssembleError, DirectTextParser, DocumentAssembler, PageRenderer, ParseError, RenderError,
    RenderedPage,
};

/// Parsed text longer than this is good enough when the selector says Base.
pub const MIN_BASE_TEXT_CHARS: usize = 200;

/// Errors from a pipeline run. No run ever returns partial output.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot parse PDF: {0}")]
    Parse(#[from] ParseError),

    #[error("Page rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Rebuilding preprocessed PDF failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("No text could be extracted from the document")]
    TextExtractionFailed,

    #[error("Pipeline timed out after {0}s")]
    Timeout(u64),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Missing OCR endpoint or key. Retrying will not help.
    pub fn is_config_missing(&self) -> bool {
        matches!(self, PipelineError::Ocr(e) if e.is_fatal_config())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::Task(e.to_string())
    }
}

/// Per-run options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Skip the selector heuristics and always run the enhanced pass.
    pub force_enhanced: bool,
}

impl PipelineOptions {
    pub fn force_enhanced() -> Self {
        Self {
            force_enhanced: true,
        }
    }
}

/// OCR decision pipeline.
///
/// Holds the external OCR client and the page rendering backend. Each call
/// to [`run`](Self::run) is independent and shares no state with other runs.
#[derive(Clone)]
pub struct OcrPipeline {
    ocr: Arc<dyn OcrClient>,
    parser: DirectTextParser,
    selector: StrategySelector,
    scorer: QualityScorer,
    renderer: PageRenderer,
    preprocessor: Arc<ImagePreprocessor>,
    dpi: u32,
    timeout: Duration,
}

impl OcrPipeline {
    /// Pipeline with default settings and the Poppler renderer.
    pub fn new(ocr: Arc<dyn OcrClient>) -> Self {
        Self {
            ocr,
            parser: DirectTextParser::new(),
            selector: StrategySelector::new(),
            scorer: QualityScorer::new(),
            renderer: PageRenderer::default(),
            preprocessor: Arc::new(ImagePreprocessor::new()),
            dpi: DEFAULT_DPI,
            timeout: Duration::from_secs(DEFAULT_PIPELINE_TIMEOUT_SECS),
        }
    }

    /// Pipeline tuned from the `pipeline` config section.
    pub fn from_config(ocr: Arc<dyn OcrClient>, config: &PipelineConfig) -> Self {
        let renderer = PageRenderer::default().with_max_pages(config.max_pages);
        Self::new(ocr)
            .with_renderer(renderer)
            .with_dpi(config.dpi)
            .with_timeout(config.timeout())
    }

    /// Use a different rendering backend or page ceiling.
    pub fn with_renderer(mut self, renderer: PageRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract text from a PDF, bounded by the configured timeout.
    pub async fn run(
        &self,
        pdf: &[u8],
        options: PipelineOptions,
    ) -> Result<PipelineResult, PipelineError> {
        match tokio::time::timeout(self.timeout, self.run_unbounded(pdf, options)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Pipeline timed out after {:?}", self.timeout);
                Err(PipelineError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    async fn run_unbounded(
        &self,
        pdf: &[u8],
        options: PipelineOptions,
    ) -> Result<PipelineResult, PipelineError> {
        // Parsed
        let parsed = self.parser.parse(pdf)?;
        let page_count = parsed.page_count;
        let base_metrics = self.scorer.score(&parsed.text);
        let base = ScoredText::new(parsed.text, base_metrics);
        debug!(
            "Direct parse: {} pages, score {:.3} {:?}",
            page_count, base.metrics.score, base.metrics.reasons
        );

        // Decided
        let decision = self.selector.select(
            &base.text,
            page_count,
            pdf.len() as u64,
            options.force_enhanced,
        );
        let base_len = base.text.trim().chars().count();
        if decision.mode == ExtractionMode::Base && base_len > MIN_BASE_TEXT_CHARS {
            info!(
                "Using direct text ({} chars, {} pages), no OCR needed",
                base_len, page_count
            );
            return Ok(PipelineResult {
                comparison: ScoreComparison {
                    base_score: base.metrics.score,
                    enhanced_score: None,
                },
                text: base.text,
                mode: ExtractionMode::Base,
                metrics: base.metrics,
                page_count,
            });
        }

        // EnhancedRun
        info!(
            "Running enhanced OCR via {} ({})",
            self.ocr.name(),
            decision.reason
        );
        let (enhanced_base, enhanced) = match self.enhanced_pass(pdf).await {
            Ok(texts) => texts,
            Err(PipelineError::Ocr(OcrError::Empty)) => {
                return self.fallback_to_base(base, page_count);
            }
            Err(e) => return Err(e),
        };

        // Arbitrated
        let result = arbitrate(base, enhanced_base, enhanced, page_count);
        if result.text.trim().is_empty() {
            return Err(PipelineError::TextExtractionFailed);
        }
        info!(
            "Selected {} text (score {:.3}, base {:.3}, enhanced {:?})",
            result.mode,
            result.metrics.score,
            result.comparison.base_score,
            result.comparison.enhanced_score
        );
        Ok(result)
    }

    /// OCR the original document, then OCR a cleaned-up rebuild of it.
    async fn enhanced_pass(&self, pdf: &[u8]) -> Result<(ScoredText, ScoredText), PipelineError> {
        let raw_text = self.ocr.analyze_non_empty(pdf).await?;
        let raw_metrics = self.scorer.score(&raw_text);
        debug!(
            "OCR over original: score {:.3} {:?}",
            raw_metrics.score, raw_metrics.reasons
        );

        let rebuilt = self.rebuild_preprocessed(pdf).await?;
        let enhanced_text = self.ocr.analyze_non_empty(&rebuilt).await?;
        let enhanced_metrics = self.scorer.score(&enhanced_text);
        debug!(
            "OCR over preprocessed pages: score {:.3} {:?}",
            enhanced_metrics.score, enhanced_metrics.reasons
        );

        Ok((
            ScoredText::new(raw_text, raw_metrics),
            ScoredText::new(enhanced_text, enhanced_metrics),
        ))
    }

    /// Render, preprocess every page in parallel, and reassemble in page order.
    async fn rebuild_preprocessed(&self, pdf: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let renderer = self.renderer.clone();
        let owned = pdf.to_vec();
        let dpi = self.dpi;
        let pages = tokio::task::spawn_blocking(move || renderer.render(&owned, dpi)).await??;
        debug!("Rendered {} pages at {} dpi", pages.len(), dpi);

        let handles: Vec<_> = pages
            .into_iter()
            .map(|page| {
                let preprocessor = Arc::clone(&self.preprocessor);
                tokio::task::spawn_blocking(move || RenderedPage {
                    page_number: page.page_number,
                    image: preprocessor.process(page.image),
                })
            })
            .collect();

        let mut processed = Vec::with_capacity(handles.len());
        for handle in handles {
            processed.push(handle.await?);
        }

        let assembler = DocumentAssembler::new(dpi);
        let rebuilt = tokio::task::spawn_blocking(move || assembler.assemble(&processed)).await??;
        debug!("Rebuilt preprocessed PDF ({} bytes)", rebuilt.len());
        Ok(rebuilt)
    }

    /// OCR came back empty: keep the parsed text if there is any.
    fn fallback_to_base(
        &self,
        base: ScoredText,
        page_count: u32,
    ) -> Result<PipelineResult, PipelineError> {
        if base.is_blank() {
            warn!("OCR returned no text and the PDF has no embedded text");
            return Err(PipelineError::TextExtractionFailed);
        }
        warn!("OCR returned no text, falling back to embedded text");
        Ok(PipelineResult {
            comparison: ScoreComparison {
                base_score: base.metrics.score,
                enhanced_score: None,
            },
            text: base.text,
            mode: ExtractionMode::Base,
            metrics: base.metrics,
            page_count,
        })
    }
}
