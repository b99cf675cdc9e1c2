//! Cheap up-front decision on whether a document needs image OCR.

use tracing::debug;

use super::types::{DecisionReason, ExtractionMode, SignalMetrics, StrategyDecision};

/// Below this many trimmed characters per page the embedded text is too thin.
pub const MIN_DENSITY: f64 = 350.0;

/// Above this share of non-printable characters the embedded text is noise.
pub const MAX_WEIRD_RATIO: f64 = 0.25;

/// Files larger than this (in MiB) are usually image scans.
pub const MAX_TEXTUAL_SIZE_MB: f64 = 8.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Printable ASCII plus the common line and tab controls.
fn is_printable_ascii(c: char) -> bool {
    matches!(c, ' '..='~' | '\n' | '\r' | '\t')
}

/// Picks Base or Enhanced from the direct-parse text and file shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelector;

impl StrategySelector {
    pub fn new() -> Self {
        Self
    }

    pub fn select(
        &self,
        text_sample: &str,
        page_count: u32,
        file_size_bytes: u64,
        force_enhanced: bool,
    ) -> StrategyDecision {
        if force_enhanced {
            debug!("Strategy: enhanced (forced)");
            return StrategyDecision {
                mode: ExtractionMode::Enhanced,
                reason: DecisionReason::ForceEnhanced,
                signal_metrics: SignalMetrics::default(),
            };
        }

        let trimmed = text_sample.trim();
        let length = trimmed.chars().count();
        let density = length as f64 / page_count.max(1) as f64;
        let weird_ratio = if length == 0 {
            1.0
        } else {
            let weird = trimmed.chars().filter(|c| !is_printable_ascii(*c)).count();
            weird as f64 / length as f64
        };
        let size_mb = file_size_bytes as f64 / BYTES_PER_MB;

        let signal_metrics = SignalMetrics {
            density,
            weird_ratio,
        };

        let noisy = density < MIN_DENSITY
            || weird_ratio > MAX_WEIRD_RATIO
            || size_mb > MAX_TEXTUAL_SIZE_MB;
        let (mode, reason) = if noisy {
            (ExtractionMode::Enhanced, DecisionReason::LowDensityOrNoisy)
        } else {
            (ExtractionMode::Base, DecisionReason::TextualPdf)
        };

        debug!(
            "Strategy: {} ({}) density={:.1} weird_ratio={:.3} size_mb={:.2}",
            mode, reason, density, weird_ratio, size_mb
        );

        StrategyDecision {
            mode,
            reason,
            signal_metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_text(chars: usize) -> String {
        "Patient examined, findings unremarkable. "
            .chars()
            .cycle()
            .take(chars)
            .collect()
    }

    #[test]
    fn test_force_enhanced_ignores_signals() {
        let decision = StrategySelector::new().select(&dense_text(5000), 1, 1000, true);
        assert_eq!(decision.mode, ExtractionMode::Enhanced);
        assert_eq!(decision.reason, DecisionReason::ForceEnhanced);
        assert_eq!(decision.signal_metrics, SignalMetrics::default());
    }

    #[test]
    fn test_low_density_selects_enhanced() {
        let decision = StrategySelector::new().select(&dense_text(300), 1, 50_000, false);
        assert_eq!(decision.mode, ExtractionMode::Enhanced);
        assert_eq!(decision.reason, DecisionReason::LowDensityOrNoisy);
        assert_eq!(decision.signal_metrics.weird_ratio, 0.0);
        assert!(decision.signal_metrics.density < MIN_DENSITY);
    }

    #[test]
    fn test_dense_clean_text_stays_base() {
        let decision = StrategySelector::new().select(&dense_text(2000), 2, 200_000, false);
        assert_eq!(decision.mode, ExtractionMode::Base);
        assert_eq!(decision.reason, DecisionReason::TextualPdf);
        assert_eq!(decision.signal_metrics.density, 1000.0);
    }

    #[test]
    fn test_empty_text_is_all_weird() {
        let decision = StrategySelector::new().select("   \n ", 1, 10, false);
        assert_eq!(decision.mode, ExtractionMode::Enhanced);
        assert_eq!(decision.signal_metrics.weird_ratio, 1.0);
        assert_eq!(decision.signal_metrics.density, 0.0);
    }

    #[test]
    fn test_noisy_text_selects_enhanced() {
        let noisy: String = "ab\u{fffd}\u{fffd}".repeat(200);
        let decision = StrategySelector::new().select(&noisy, 1, 10_000, false);
        assert_eq!(decision.mode, ExtractionMode::Enhanced);
        assert!((decision.signal_metrics.weird_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_large_files_select_enhanced() {
        let nine_mb = 9 * 1024 * 1024;
        let decision = StrategySelector::new().select(&dense_text(2000), 1, nine_mb, false);
        assert_eq!(decision.mode, ExtractionMode::Enhanced);
        assert_eq!(decision.reason, DecisionReason::LowDensityOrNoisy);
    }

    #[test]
    fn test_zero_page_count_treated_as_one() {
        let decision = StrategySelector::new().select(&dense_text(400), 0, 10, false);
        assert_eq!(decision.signal_metrics.density, 400.0);
        assert_eq!(decision.mode, ExtractionMode::Base);
    }

    #[test]
    fn test_density_counts_characters_not_bytes() {
        let hebrew = "א".repeat(400);
        let decision = StrategySelector::new().select(&hebrew, 1, 10, false);
        assert_eq!(decision.signal_metrics.density, 400.0);
        // Non-ASCII letters count as weird
        assert_eq!(decision.signal_metrics.weird_ratio, 1.0);
    }
}
