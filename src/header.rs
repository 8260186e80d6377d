//! Header-row detection.
//!
//! Points are awarded for signals that the first row holds labels rather than data:
//!
//! - +2 when no first-row token parses as a number
//! - +1 when first-row tokens are unique (case-insensitive)
//! - +2 when more than a third of positions switch from text in row 1 to a number in row 2
//! - +1 when any first-row token contains a letter
//!
//! A score of 2 or more means the first row is a header.

use foldhash::{HashSet, HashSetExt};

use crate::field_type::is_numeric;
use crate::tokenizer::{non_blank_lines, tokenize_line};

/// Number of rows parsed by default.
pub const DEFAULT_SAMPLE_ROWS: usize = 10;

const HEADER_THRESHOLD: u32 = 2;
const MAX_SCORE: f64 = 5.0;

/// Whether the text starts with a header row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderInfo {
    /// True when row 1 looks like column labels.
    pub has_header: bool,
    /// Index of the header row among non-blank lines.
    pub header_row_index: usize,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f64,
}

impl HeaderInfo {
    /// Create a new `HeaderInfo`.
    pub const fn new(has_header: bool, header_row_index: usize, confidence: f64) -> Self {
        Self {
            has_header,
            header_row_index,
            confidence,
        }
    }
}

impl Default for HeaderInfo {
    /// Assume a header when there is not enough data to tell.
    fn default() -> Self {
        Self::new(true, 0, 0.5)
    }
}

/// Detect a header row using the default sample size.
pub fn detect(text: &str, delimiter: char) -> HeaderInfo {
    detect_with_sample(text, delimiter, DEFAULT_SAMPLE_ROWS)
}

/// Detect a header row, parsing at most `sample_rows` non-blank lines.
pub fn detect_with_sample(text: &str, delimiter: char, sample_rows: usize) -> HeaderInfo {
    let rows: Vec<Vec<String>> = non_blank_lines(text)
        .take(sample_rows.max(2))
        .map(|line| tokenize_line(line, delimiter))
        .collect();

    if rows.len() < 2 {
        return HeaderInfo::default();
    }

    let first: Vec<&str> = rows[0].iter().map(|t| t.trim()).collect();
    let second: Vec<&str> = rows[1].iter().map(|t| t.trim()).collect();

    let score = header_score(&first, &second);
    HeaderInfo::new(
        score >= HEADER_THRESHOLD,
        0,
        (f64::from(score) / MAX_SCORE).min(1.0),
    )
}

fn header_score(first: &[&str], second: &[&str]) -> u32 {
    let mut score = 0;

    if first.iter().all(|t| !is_numeric(t)) {
        score += 2;
    }

    let mut seen = HashSet::with_capacity(first.len());
    if first.iter().all(|t| seen.insert(t.to_lowercase())) {
        score += 1;
    }

    let compared = first.len().min(second.len());
    if compared > 0 {
        let shifts = first
            .iter()
            .zip(second)
            .filter(|(a, b)| !is_numeric(a) && is_numeric(b))
            .count();
        if shifts * 3 > compared {
            score += 2;
        }
    }

    if first.iter().any(|t| t.chars().any(char::is_alphabetic)) {
        score += 1;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_header() {
        let info = detect("id,name,value\n1,Alice,100", ',');
        assert!(info.has_header);
        assert!(info.confidence >= 0.6);
        assert_eq!(info.header_row_index, 0);
    }

    #[test]
    fn test_numeric_rows() {
        let info = detect("1,2,3\n4,5,6", ',');
        assert!(!info.has_header || info.confidence < 0.5);
        assert!(!info.has_header);
    }

    #[test]
    fn test_single_line_assumes_header() {
        assert_eq!(detect("a,b,c", ','), HeaderInfo::new(true, 0, 0.5));
        assert_eq!(detect("", ','), HeaderInfo::default());
    }

    #[test]
    fn test_duplicate_labels_lower_confidence() {
        let unique = detect("a,b\nx,y", ',');
        let dupes = detect("a,A\nx,y", ',');
        assert!(dupes.confidence < unique.confidence);
        assert!(dupes.has_header);
    }

    #[test]
    fn test_all_text_rows() {
        // Text header over text data: no type shift, still a header.
        let info = detect("city;country\nParis;France\nRome;Italy", ';');
        assert!(info.has_header);
        assert!((info.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_quoted_header_tokens() {
        let info = detect("\"id\",\"amount\"\n1,2.5\n", ',');
        assert!(info.has_header);
        assert_eq!(info.confidence, 1.0);
    }
}
