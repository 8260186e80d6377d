//! Dialect auto-detection for [`MemoryEngine`](super::MemoryEngine), used when a read has no
//! delimiter.
//!
//! Each candidate dialect parses a sample into a table, which is scored with the Table
//! Uniformity Method from "Wrangling Messy CSV Files by Detecting Row and Type Patterns"
//! (van den Burg, Nazábal, and Sutton, 2019):
//! - `tau_0` (consistency): do all rows have the same number of fields
//! - `tau_1` (dispersion): how much do the field counts vary
//! - type score: how consistent is each column's cell type

use std::cmp::Ordering;
use std::io::Cursor;

use foldhash::{HashMap, HashMapExt};
use rayon::prelude::*;

use super::Quote;
use crate::field_type::{ColumnType, detect_cell_type};

/// Delimiters tried during auto-detection, most common first.
/// Colon is left out as it appears in time values.
pub const DELIMITERS: &[u8] = b",;\t| ^~#&/";

/// Quote characters tried during auto-detection.
pub const QUOTES: &[Quote] = &[Quote::Some(b'"'), Quote::Some(b'\''), Quote::None];

/// A delimiter and quote pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dialect {
    /// Field delimiter.
    pub delimiter: u8,
    /// Quote character.
    pub quote: Quote,
}

impl Dialect {
    /// Create a new dialect.
    pub const fn new(delimiter: u8, quote: Quote) -> Self {
        Self { delimiter, quote }
    }
}

/// Every delimiter/quote combination tried by [`sniff`].
pub fn candidate_dialects() -> Vec<Dialect> {
    let mut dialects = Vec::with_capacity(DELIMITERS.len() * QUOTES.len());
    for &delimiter in DELIMITERS {
        for &quote in QUOTES {
            dialects.push(Dialect::new(delimiter, quote));
        }
    }
    dialects
}

/// A sample parsed with one dialect.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// The parsed rows.
    pub rows: Vec<Vec<String>>,
    /// Number of fields in each row.
    pub field_counts: Vec<usize>,
    modal_field_count: usize,
}

impl Table {
    /// Build a table from rows.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let field_counts: Vec<usize> = rows.iter().map(Vec::len).collect();
        let modal_field_count = modal(&field_counts);
        Self {
            rows,
            field_counts,
            modal_field_count,
        }
    }

    /// Returns true if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the modal (most common) field count.
    #[inline]
    pub fn modal_field_count(&self) -> usize {
        self.modal_field_count
    }
}

/// Ties prefer the higher field count so the result does not depend on map order.
fn modal(field_counts: &[usize]) -> usize {
    let mut counts: HashMap<usize, usize> = HashMap::with_capacity(field_counts.len());
    for &fc in field_counts {
        *counts.entry(fc).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(fc_a, count_a), (fc_b, count_b)| {
            count_a.cmp(count_b).then_with(|| fc_a.cmp(fc_b))
        })
        .map_or(0, |(fc, _)| fc)
}

/// Parse at most `max_rows` rows of `text` with `dialect`. Parsing stops at the first error.
pub fn parse_table(text: &str, dialect: Dialect, max_rows: usize) -> Table {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(dialect.delimiter)
        .has_headers(false)
        .flexible(true);
    match dialect.quote {
        Quote::None => {
            builder.quoting(false);
        }
        Quote::Some(q) => {
            builder.quoting(true).quote(q);
        }
    }

    let mut reader = builder.from_reader(Cursor::new(text.as_bytes()));
    let mut record = csv::StringRecord::new();
    let mut rows = Vec::new();
    let limit = if max_rows == 0 { usize::MAX } else { max_rows };

    while rows.len() < limit {
        match reader.read_record(&mut record) {
            Ok(true) => rows.push(record.iter().map(str::to_string).collect()),
            Ok(false) | Err(_) => break,
        }
    }

    Table::from_rows(rows)
}

/// `tau_0 = 1 / (1 + 2 * sigma)` where sigma is the standard deviation of field counts.
pub fn tau_0(table: &Table) -> f64 {
    if table.field_counts.is_empty() {
        return 0.0;
    }
    1.0 / 2.0f64.mul_add(standard_deviation(&table.field_counts), 1.0)
}

/// Dispersion score in `[0, 1]` from the field-count range, the number of transitions
/// between consecutive rows, and the share of rows with the modal count.
pub fn tau_1(table: &Table) -> f64 {
    let counts = &table.field_counts;
    let n = counts.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return 1.0;
    }

    let min_fc = counts.iter().copied().min().unwrap_or(0);
    let max_fc = counts.iter().copied().max().unwrap_or(0);
    let range_score = if max_fc == 0 {
        0.0
    } else {
        1.0 - ((max_fc - min_fc) as f64 / max_fc as f64).min(1.0)
    };

    let transitions = counts.windows(2).filter(|w| w[0] != w[1]).count();
    let transition_score = 1.0 - transitions as f64 / (n - 1) as f64;

    let modal = table.modal_field_count();
    let mode_score = counts.iter().filter(|&&c| c == modal).count() as f64 / n as f64;

    mode_score.mul_add(0.4, range_score * 0.3 + transition_score * 0.3)
}

fn standard_deviation(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    let variance = values
        .iter()
        .map(|&v| {
            let diff = v as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}

const TYPE_COUNT: usize = 7;

const fn type_index(t: ColumnType) -> usize {
    match t {
        ColumnType::Null => 0,
        ColumnType::Boolean => 1,
        ColumnType::Integer => 2,
        ColumnType::Float => 3,
        ColumnType::Date => 4,
        ColumnType::Timestamp => 5,
        ColumnType::Text => 6,
    }
}

/// Average per-column share of non-null cells that have the column's dominant type.
pub fn type_score(table: &Table) -> f64 {
    let num_cols = table.modal_field_count();
    if table.is_empty() || num_cols == 0 {
        return 0.0;
    }

    let mut col_type_counts = vec![[0usize; TYPE_COUNT]; num_cols];
    for row in &table.rows {
        for (col, cell) in row.iter().enumerate().take(num_cols) {
            col_type_counts[col][type_index(detect_cell_type(cell))] += 1;
        }
    }

    let mut total = 0.0;
    let mut valid_cols = 0;
    for counts in &col_type_counts {
        let non_null: usize = counts[1..].iter().sum();
        let score = if non_null == 0 {
            if counts[0] == 0 { 0.0 } else { 0.5 }
        } else {
            counts[1..].iter().copied().max().unwrap_or(0) as f64 / non_null as f64
        };
        if score > 0.0 {
            total += score;
            valid_cols += 1;
        }
    }

    if valid_cols == 0 {
        0.0
    } else {
        total / valid_cols as f64
    }
}

/// Score of one dialect against a sample.
#[derive(Debug, Clone, Copy)]
pub struct DialectScore {
    /// The dialect that was scored.
    pub dialect: Dialect,
    /// Combined score (higher is better).
    pub gamma: f64,
    /// Modal field count.
    pub num_fields: usize,
}

/// Parse `text` with `dialect` and score the result.
pub fn score_dialect(text: &str, dialect: Dialect, max_rows: usize) -> DialectScore {
    let table = parse_table(text, dialect, max_rows);
    let gamma = if table.is_empty() {
        0.0
    } else {
        gamma(&table, dialect.delimiter) * quote_evidence(text, dialect.quote)
    };
    DialectScore {
        dialect,
        gamma,
        num_fields: table.modal_field_count(),
    }
}

fn gamma(table: &Table, delimiter: u8) -> f64 {
    let uniformity = (tau_0(table) * tau_1(table)).sqrt();
    let num_rows = table.num_rows();
    let field_count = table.modal_field_count();

    let row_bonus = (num_rows.min(20) as f64 / 20.0) * 0.1;
    let field_bonus = if field_count >= 2 {
        (field_count.min(10) as f64 / 10.0) * 0.2
    } else {
        0.0
    };

    let single_field_penalty = if field_count == 1 { 0.5 } else { 1.0 };
    let high_field_penalty = if field_count > 100 {
        0.5
    } else if field_count > 50 {
        0.8
    } else {
        1.0
    };
    let small_sample_penalty = if num_rows < 3 {
        0.70
    } else if num_rows < 5 {
        0.85
    } else {
        1.0
    };
    let delimiter_penalty = match delimiter {
        b',' | b';' | b'\t' => 1.0,
        b'|' => 0.98,
        b' ' => 0.75,
        b'^' | b'~' => 0.80,
        b'/' => 0.65,
        _ => 0.60,
    };

    let raw = uniformity.mul_add(0.5, type_score(table) * 0.3) + row_bonus + field_bonus;
    raw * single_field_penalty * high_field_penalty * small_sample_penalty * delimiter_penalty
}

/// Multiplier from quote density (quotes per 1000 bytes). Apostrophes in prose are common,
/// so single quotes only win when they dominate.
fn quote_evidence(text: &str, quote: Quote) -> f64 {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return 1.0;
    }
    let double = bytecount::count(bytes, b'"') * 1000 / bytes.len();
    let single = bytecount::count(bytes, b'\'') * 1000 / bytes.len();
    let threshold = 5;

    match quote {
        Quote::Some(b'"') if double >= threshold => 1.03,
        Quote::Some(b'\'') if single >= threshold * 2 && double < threshold => 1.05,
        Quote::Some(b'\'') if double >= threshold => 0.95,
        Quote::None if double >= threshold => 0.90,
        _ => 1.0,
    }
}

const fn delimiter_priority(delimiter: u8) -> u8 {
    match delimiter {
        b',' => 10,
        b';' => 9,
        b'\t' => 8,
        b'|' => 7,
        b'^' | b'~' => 3,
        b'/' | b' ' => 2,
        b'#' | b'&' => 1,
        _ => 0,
    }
}

const fn quote_priority(quote: Quote) -> u8 {
    match quote {
        Quote::Some(b'"') => 3,
        Quote::Some(b'\'') => 2,
        Quote::None => 1,
        Quote::Some(_) => 0,
    }
}

fn preference(a: &DialectScore, b: &DialectScore) -> Ordering {
    delimiter_priority(a.dialect.delimiter)
        .cmp(&delimiter_priority(b.dialect.delimiter))
        .then_with(|| quote_priority(a.dialect.quote).cmp(&quote_priority(b.dialect.quote)))
}

/// Pick the best score. Scores within 10% of each other are ranked by delimiter and quote
/// preference instead of raw gamma.
pub fn find_best(scores: &[DialectScore]) -> Option<&DialectScore> {
    let positive = || scores.iter().filter(|s| s.gamma > 0.0);
    let all_single_field = positive().all(|s| s.num_fields <= 1);

    positive().max_by(|a, b| {
        if all_single_field {
            return preference(a, b);
        }
        let ratio = if a.gamma > b.gamma {
            b.gamma / a.gamma
        } else {
            a.gamma / b.gamma
        };
        if ratio > 0.90 {
            preference(a, b).then_with(|| a.gamma.partial_cmp(&b.gamma).unwrap_or(Ordering::Equal))
        } else {
            a.gamma.partial_cmp(&b.gamma).unwrap_or(Ordering::Equal)
        }
    })
}

/// Detect the dialect of `text` from its first `max_rows` rows. Candidates are scored in
/// parallel.
pub fn sniff(text: &str, max_rows: usize) -> Option<Dialect> {
    let scores: Vec<DialectScore> = candidate_dialects()
        .into_par_iter()
        .map(|dialect| score_dialect(text, dialect, max_rows))
        .collect();
    find_best(&scores).map(|s| s.dialect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_counts(counts: &[usize]) -> Table {
        Table::from_rows(
            counts
                .iter()
                .map(|&n| vec!["x".to_string(); n])
                .collect(),
        )
    }

    #[test]
    fn test_parse_quoted_csv() {
        let table = parse_table("\"a,b\",c,d\n1,2,3\n", Dialect::new(b',', Quote::Some(b'"')), 0);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows[0], vec!["a,b", "c", "d"]);
    }

    #[test]
    fn test_modal_field_count() {
        assert_eq!(table_with_counts(&[3, 3, 3, 4, 3]).modal_field_count(), 3);
        assert_eq!(table_with_counts(&[2, 4]).modal_field_count(), 4);
    }

    #[test]
    fn test_tau_uniform() {
        let table = table_with_counts(&[3, 3, 3, 3, 3]);
        assert!((tau_0(&table) - 1.0).abs() < 0.001);
        assert!((tau_1(&table) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_tau_varied() {
        let table = table_with_counts(&[3, 4, 3, 5, 3]);
        assert!(tau_0(&table) < 1.0 && tau_0(&table) > 0.0);
        assert!(tau_1(&table) < 1.0);
    }

    #[test]
    fn test_wrong_delimiter_lower_score() {
        let data = "a,b,c\n1,2,3\n4,5,6\n";
        let right = score_dialect(data, Dialect::new(b',', Quote::Some(b'"')), 100);
        let wrong = score_dialect(data, Dialect::new(b';', Quote::Some(b'"')), 100);
        assert!(right.gamma > wrong.gamma);
        assert_eq!(right.num_fields, 3);
    }

    #[test]
    fn test_sniff_semicolon() {
        let data = "name;price;qty\nApple;1,50;3\nPear;2,75;4\nPlum;0,99;12\nFig;3,10;1\n";
        let dialect = sniff(data, 100).unwrap();
        assert_eq!(dialect.delimiter, b';');
    }

    #[test]
    fn test_sniff_tab() {
        let data = "a\tb\tc\n1\t2\t3\n4\t5\t6\n7\t8\t9\n";
        assert_eq!(sniff(data, 100).unwrap().delimiter, b'\t');
    }

    #[test]
    fn test_sniff_single_column_prefers_comma() {
        let dialect = sniff("alpha\nbeta\ngamma\n", 100).unwrap();
        assert_eq!(dialect.delimiter, b',');
        assert_eq!(dialect.quote, Quote::Some(b'"'));
    }

    #[test]
    fn test_sniff_empty() {
        assert!(sniff("", 100).is_none());
    }
}
