//! Line-level cleanup of stored OCR line maps.
//!
//! Runs after extraction when the OCR score is low or downstream timeline
//! review flags suggest the text is noisy. Each line is sanitized and the
//! sanitized map replaces the original unless it would lose content.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::ExtractionMode;

/// OCR scores below this trigger hardening on their own.
pub const LOW_SCORE_THRESHOLD: f64 = 0.55;

/// This many undated events trigger hardening on their own.
pub const MIN_UNDATED_EVENTS: usize = 3;

/// Characters with no visible width that OCR engines leave behind.
const ZERO_WIDTH: [char; 5] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

/// A review flag raised by downstream timeline rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReviewFlag {
    EventWithoutDate,
    TimelineTooGeneric,
    /// Any other code; never triggers hardening.
    Other(String),
}

impl ReviewFlag {
    pub fn code(&self) -> &str {
        match self {
            ReviewFlag::EventWithoutDate => "EVENT_WITHOUT_DATE",
            ReviewFlag::TimelineTooGeneric => "TIMELINE_TOO_GENERIC",
            ReviewFlag::Other(code) => code.as_str(),
        }
    }
}

impl FromStr for ReviewFlag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "EVENT_WITHOUT_DATE" => ReviewFlag::EventWithoutDate,
            "TIMELINE_TOO_GENERIC" => ReviewFlag::TimelineTooGeneric,
            other => ReviewFlag::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ReviewFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One line of a stored OCR line map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalLine {
    pub text: String,
}

impl From<&str> for LexicalLine {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl From<String> for LexicalLine {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// Retained content of one variant of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardeningPass {
    pub mode: ExtractionMode,
    pub text_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardeningResult {
    pub improved_map: Vec<LexicalLine>,
    pub chosen_pass: ExtractionMode,
    /// Always the original (Base) pass followed by the sanitized (Enhanced) pass.
    pub passes: Vec<HardeningPass>,
}

/// Whether a stored extraction should be hardened.
pub fn should_trigger(ocr_score: Option<f64>, flags: &[ReviewFlag]) -> bool {
    if ocr_score.is_some_and(|score| score < LOW_SCORE_THRESHOLD) {
        return true;
    }

    let undated = flags
        .iter()
        .filter(|f| **f == ReviewFlag::EventWithoutDate)
        .count();
    let generic = flags
        .iter()
        .filter(|f| **f == ReviewFlag::TimelineTooGeneric)
        .count();

    undated >= MIN_UNDATED_EVENTS || (generic >= 1 && undated >= 1)
}

/// Sanitize a line map and keep whichever variant retains more content.
pub fn apply_hardening(lexical_map: &[LexicalLine]) -> HardeningResult {
    let mut sanitized: Vec<String> = lexical_map
        .iter()
        .map(|l| sanitize_line(&l.text))
        .collect();
    rejoin_wraps(&mut sanitized);

    let base_length = retained_length(lexical_map.iter().map(|l| l.text.as_str()));
    let enhanced_length = retained_length(sanitized.iter().map(String::as_str));

    let passes = vec![
        HardeningPass {
            mode: ExtractionMode::Base,
            text_length: base_length,
        },
        HardeningPass {
            mode: ExtractionMode::Enhanced,
            text_length: enhanced_length,
        },
    ];

    let (chosen_pass, improved_map) = if enhanced_length >= base_length {
        (
            ExtractionMode::Enhanced,
            sanitized.into_iter().map(LexicalLine::from).collect(),
        )
    } else {
        (ExtractionMode::Base, lexical_map.to_vec())
    };

    debug!(
        "Hardened {} lines: base={} enhanced={} chose {}",
        lexical_map.len(),
        base_length,
        enhanced_length,
        chosen_pass
    );

    HardeningResult {
        improved_map,
        chosen_pass,
        passes,
    }
}

/// Strip zero-width marks and collapse whitespace runs to single spaces.
fn sanitize_line(line: &str) -> String {
    let visible: String = line.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect();
    visible.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A line ending in a letter followed by `-` continues on the next line.
fn ends_with_wrap(line: &str) -> bool {
    let mut chars = line.chars().rev();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_alphabetic)
}

/// Pull the first word of the continuation line up onto the wrapped line.
/// Line count is preserved.
fn rejoin_wraps(lines: &mut [String]) {
    for i in 0..lines.len().saturating_sub(1) {
        if !ends_with_wrap(&lines[i]) || lines[i + 1].is_empty() {
            continue;
        }
        let next = std::mem::take(&mut lines[i + 1]);
        let (word, rest) = match next.split_once(' ') {
            Some((word, rest)) => (word.to_string(), rest.to_string()),
            None => (next.clone(), String::new()),
        };
        lines[i].pop();
        lines[i].push_str(&word);
        lines[i + 1] = rest;
    }
}

/// Content measure: non-whitespace characters across all lines.
fn retained_length<'a>(lines: impl Iterator<Item = &'a str>) -> usize {
    lines
        .flat_map(str::chars)
        .filter(|c| !c.is_whitespace())
        .count()
}
