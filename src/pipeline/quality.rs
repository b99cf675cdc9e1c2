//! Heuristic plausibility score for extracted text.

use super::types::OcrMetrics;

/// Non-whitespace characters needed for a full length score.
const FULL_LENGTH: f64 = 400.0;

/// Alphabetic share that counts as fully "wordy" text.
const FULL_ALPHA_RATIO: f64 = 0.6;

const LENGTH_WEIGHT: f64 = 0.35;
const PLAUSIBLE_WEIGHT: f64 = 0.40;
const ALPHA_WEIGHT: f64 = 0.25;
const GARBLED_PENALTY: f64 = 0.05;
const MAX_PENALIZED_RUNS: usize = 6;

/// Shortest run of consecutive symbols treated as garbage.
const GARBLED_RUN_LEN: usize = 4;

const LOW_PLAUSIBLE_RATIO: f64 = 0.9;
const HIGH_PUNCTUATION_RATIO: f64 = 0.3;

const REPLACEMENT_CHAR: char = '\u{fffd}';

/// Punctuation normal prose (English or Hebrew) is expected to contain.
fn is_common_punctuation(c: char) -> bool {
    matches!(
        c,
        '.' | ','
            | ';'
            | ':'
            | '!'
            | '?'
            | '\''
            | '"'
            | '('
            | ')'
            | '['
            | ']'
            | '-'
            | '/'
            | '%'
            | '&'
            | '@'
            | '#'
            | '*'
            | '+'
            | '='
            | '_'
            | '§'
            | '$'
            | '₪'
            | '€'
            | '–'
            | '—'
            | '׳'
            | '״'
            | '\u{05be}'
    )
}

/// Count runs of at least four consecutive non-alphanumeric, non-space
/// characters. Any run containing U+FFFD counts regardless of length.
fn garbled_runs(text: &str) -> usize {
    let mut runs = 0;
    let mut run_len = 0;
    let mut run_has_replacement = false;

    let mut close_run = |len: usize, has_replacement: bool| {
        if len >= GARBLED_RUN_LEN || has_replacement {
            runs += 1;
        }
    };

    for c in text.chars() {
        if c.is_alphanumeric() || c.is_whitespace() {
            close_run(run_len, run_has_replacement);
            run_len = 0;
            run_has_replacement = false;
        } else {
            run_len += 1;
            run_has_replacement |= c == REPLACEMENT_CHAR;
        }
    }
    close_run(run_len, run_has_replacement);
    runs
}

/// Scores text plausibility in [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, text: &str) -> OcrMetrics {
        let mut total = 0usize;
        let mut alphabetic = 0usize;
        let mut alphanumeric = 0usize;
        let mut punctuation = 0usize;

        for c in text.chars().filter(|c| !c.is_whitespace()) {
            total += 1;
            if c.is_alphanumeric() {
                alphanumeric += 1;
                if c.is_alphabetic() {
                    alphabetic += 1;
                }
            } else if is_common_punctuation(c) {
                punctuation += 1;
            }
        }

        if total == 0 {
            return OcrMetrics::empty();
        }

        let n = total as f64;
        let length_score = (n / FULL_LENGTH).min(1.0);
        let plausible_ratio = (alphanumeric + punctuation) as f64 / n;
        let alpha_ratio = alphabetic as f64 / n;
        let punctuation_ratio = punctuation as f64 / n;
        let runs = garbled_runs(text);

        let raw = LENGTH_WEIGHT * length_score
            + PLAUSIBLE_WEIGHT * plausible_ratio
            + ALPHA_WEIGHT * (alpha_ratio / FULL_ALPHA_RATIO).min(1.0)
            - GARBLED_PENALTY * runs.min(MAX_PENALIZED_RUNS) as f64;

        let mut reasons = Vec::new();
        if length_score < 1.0 {
            reasons.push("short_text".to_string());
        }
        if plausible_ratio < LOW_PLAUSIBLE_RATIO {
            reasons.push("low_printable_ratio".to_string());
        }
        if alpha_ratio < FULL_ALPHA_RATIO {
            reasons.push("low_alphabetic_ratio".to_string());
        }
        if runs > 0 {
            reasons.push("garbled_runs".to_string());
        }
        if punctuation_ratio > HIGH_PUNCTUATION_RATIO {
            reasons.push("high_punctuation_density".to_string());
        }

        OcrMetrics {
            score: raw.clamp(0.0, 1.0),
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_scores_zero() {
        let scorer = QualityScorer::new();
        for text in ["", "   ", "\n\t\n"] {
            let metrics = scorer.score(text);
            assert_eq!(metrics.score, 0.0);
            assert_eq!(metrics.reasons, vec!["empty_text"]);
        }
    }

    #[test]
    fn test_long_english_prose_scores_high() {
        let text = "The patient was admitted on the morning of the exam, with mild pain. "
            .repeat(10);
        let metrics = QualityScorer::new().score(&text);
        assert!(metrics.score >= 0.8, "score {}", metrics.score);
        assert!(metrics.reasons.is_empty(), "{:?}", metrics.reasons);
    }

    #[test]
    fn test_long_hebrew_prose_scores_high() {
        let text = "המטופל נבדק בבית החולים, נמצא במצב יציב. ".repeat(20);
        let metrics = QualityScorer::new().score(&text);
        assert!(metrics.score >= 0.8, "score {}", metrics.score);
    }

    #[test]
    fn test_garbage_scores_lower_than_prose() {
        let scorer = QualityScorer::new();
        let prose = scorer.score(&"Diagnosis confirmed by imaging. ".repeat(20));
        let garbage = scorer.score(&"~^|~ ¤¤¤¤ \u{fffd}x{}<> ".repeat(20));

        assert!(garbage.score < prose.score);
        assert!(garbage.reasons.contains(&"garbled_runs".to_string()));
        assert!(garbage.reasons.contains(&"low_printable_ratio".to_string()));
    }

    #[test]
    fn test_longer_text_never_scores_lower() {
        let scorer = QualityScorer::new();
        let short = scorer.score("Clinical summary follows.");
        let long = scorer.score(&"Clinical summary follows. ".repeat(30));
        assert!(long.score >= short.score);
        assert!(short.reasons.contains(&"short_text".to_string()));
    }

    #[test]
    fn test_score_is_clamped() {
        let metrics = QualityScorer::new().score(&"#### ".repeat(50));
        assert!((0.0..=1.0).contains(&metrics.score));
        assert!(metrics.reasons.contains(&"high_punctuation_density".to_string()));
    }

    #[test]
    fn test_garbled_runs() {
        assert_eq!(garbled_runs("plain words here"), 0);
        assert_eq!(garbled_runs("a ... b"), 0);
        assert_eq!(garbled_runs("a .... b"), 1);
        assert_eq!(garbled_runs("x\u{fffd}y"), 1);
        assert_eq!(garbled_runs("~~~~ ok ^^^^"), 2);
    }
}
