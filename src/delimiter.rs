//! Delimiter inference over sanitized text.

use crate::tokenizer::{count_delimiters, non_blank_lines};

/// Candidate delimiters, in tie-breaking order.
pub const CANDIDATES: &[char] = &[',', '\t', ';', '|'];

/// Number of non-blank lines inspected by default.
pub const DEFAULT_SAMPLE_LINES: usize = 20;

/// Bonus multiplier for comma, the most common delimiter.
const COMMA_BONUS: f64 = 1.1;

/// The inferred delimiter and a heuristic confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelimiterInfo {
    /// The chosen delimiter.
    pub delimiter: char,
    /// Heuristic score in `[0, 1]`. Not a probability.
    pub confidence: f64,
}

impl Default for DelimiterInfo {
    fn default() -> Self {
        Self {
            delimiter: ',',
            confidence: 0.0,
        }
    }
}

impl DelimiterInfo {
    /// Printable name of the delimiter, e.g. `tab` or `;`.
    pub fn display_name(&self) -> String {
        delimiter_name(self.delimiter)
    }
}

/// Human-readable delimiter name.
pub fn delimiter_name(delimiter: char) -> String {
    match delimiter {
        '\t' => "tab".to_string(),
        ' ' => "space".to_string(),
        other => other.to_string(),
    }
}

/// Infer the delimiter from the first [`DEFAULT_SAMPLE_LINES`] non-blank lines.
pub fn infer(text: &str) -> DelimiterInfo {
    infer_with_sample(text, DEFAULT_SAMPLE_LINES)
}

/// Infer the delimiter from the first `sample_lines` non-blank lines.
///
/// Each candidate is scored as `consistency * average * coverage`, where `average` is the
/// mean quote-aware count over lines that contain the candidate, `consistency` is the share
/// of those lines within one of the mean, and `coverage` is the share of sampled lines that
/// contain it at all.
pub fn infer_with_sample(text: &str, sample_lines: usize) -> DelimiterInfo {
    let lines: Vec<&str> = non_blank_lines(text).take(sample_lines.max(1)).collect();
    if lines.is_empty() {
        return DelimiterInfo::default();
    }

    let mut best = DelimiterInfo::default();
    let mut best_score = 0.0;

    for &candidate in CANDIDATES {
        let score = score_candidate(&lines, candidate);
        // Strictly greater keeps the earlier candidate on ties.
        if score > best_score {
            best_score = score;
            best.delimiter = candidate;
        }
    }

    best.confidence = (best_score / 10.0).min(1.0);
    best
}

fn score_candidate(lines: &[&str], candidate: char) -> f64 {
    let counts: Vec<usize> = lines
        .iter()
        .map(|line| count_delimiters(line, candidate))
        .collect();
    let non_zero: Vec<usize> = counts.iter().copied().filter(|&c| c > 0).collect();
    if non_zero.is_empty() {
        return 0.0;
    }

    let mean = non_zero.iter().sum::<usize>() as f64 / non_zero.len() as f64;
    let consistent = non_zero
        .iter()
        .filter(|&&c| (c as f64 - mean).abs() <= 1.0)
        .count();
    let consistency = consistent as f64 / non_zero.len() as f64;
    let coverage = non_zero.len() as f64 / counts.len() as f64;

    let score = consistency * mean * coverage;
    if candidate == ',' {
        score * COMMA_BONUS
    } else {
        score
    }
}
