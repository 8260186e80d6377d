//! Structure detection: preamble lines and multi-row headers.
//!
//! The loader does not merge multi-row headers itself. A [`StructureDetector`] reports where
//! the header and the data start, and merges the header rows; the result becomes
//! [`LoadOptions`] via [`plan_load_options`]. [`PreambleDetector`] is a heuristic detector that
//! needs no outside service.

use thiserror::Error;

use crate::field_type::is_numeric;
use crate::metadata::LoadOptions;
use crate::tokenizer::tokenize_line;

/// Lines handed to a detector by [`plan_load_options`].
pub const DEFAULT_STRUCTURE_LINES: usize = 50;

/// Most header rows [`PreambleDetector`] will merge.
const MAX_HEADER_ROWS: usize = 3;

/// Failure reported by a structure detector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("structure detection failed: {0}")]
pub struct StructureError(pub String);

/// Where the header and data sit in the raw lines. Row indices are 0-based.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureReport {
    /// First header row.
    pub header_row: usize,
    /// First data row.
    pub data_start_row: usize,
    /// Lines before the header.
    pub skip_rows: usize,
    /// True when the header spans more than one row.
    pub has_multi_row_header: bool,
    /// Last header row of a multi-row header.
    pub multi_row_header_end: Option<usize>,
    /// Human-readable notes about the layout.
    pub issues: Vec<String>,
}

/// Finds the header and data rows in raw lines and merges multi-row headers.
pub trait StructureDetector {
    /// Locate the header and the first data row.
    fn detect_structure(&self, raw_lines: &[&str]) -> Result<StructureReport, StructureError>;

    /// Merge several header rows into one name per column.
    fn merge_headers(&self, header_rows: &[&str]) -> Result<Vec<String>, StructureError>;
}

impl LoadOptions {
    /// Options that apply a structure report.
    ///
    /// With a multi-row header and merged names, every line up to the data is skipped and
    /// the merged names become the header. Otherwise only the preamble is skipped.
    pub fn from_structure(report: &StructureReport, merged_headers: Option<Vec<String>>) -> Self {
        match merged_headers {
            Some(headers) if report.has_multi_row_header => Self {
                skip_rows: report.data_start_row,
                custom_headers: Some(headers),
                sheet: None,
            },
            _ => Self::skip_rows(report.skip_rows),
        }
    }
}

/// Ask `detector` how `text` is laid out and turn the answer into load options.
///
/// Never fails: a detector error or an inconsistent report degrades to default options,
/// recorded in the returned warnings.
pub fn plan_load_options(
    detector: &dyn StructureDetector,
    text: &str,
    delimiter: char,
) -> (LoadOptions, Vec<String>) {
    let lines: Vec<&str> = text.lines().take(DEFAULT_STRUCTURE_LINES).collect();
    let mut warnings = Vec::new();

    let report = match detector.detect_structure(&lines) {
        Ok(report) => report,
        Err(err) => {
            warnings.push(format!("{err}; loading without structure overrides"));
            return (LoadOptions::default(), warnings);
        }
    };

    if report.data_start_row <= report.header_row
        || report.data_start_row >= lines.len()
        || report.skip_rows > report.header_row
    {
        warnings.push(format!(
            "Ignoring inconsistent structure report (header row {}, data row {}, {} lines)",
            report.header_row,
            report.data_start_row,
            lines.len()
        ));
        return (LoadOptions::default(), warnings);
    }

    warnings.extend(report.issues.iter().map(|issue| format!("Structure: {issue}")));

    if !report.has_multi_row_header {
        return (LoadOptions::from_structure(&report, None), warnings);
    }

    match detector.merge_headers(&lines[report.header_row..report.data_start_row]) {
        Ok(merged) => {
            let data_fields = tokenize_line(lines[report.data_start_row], delimiter).len();
            if merged.len() != data_fields {
                warnings.push(format!(
                    "Merged header has {} names but the first data row has {data_fields} fields",
                    merged.len()
                ));
            }
            (LoadOptions::from_structure(&report, Some(merged)), warnings)
        }
        Err(err) => {
            warnings.push(format!("{err}; using the first header row only"));
            (LoadOptions::from_structure(&report, None), warnings)
        }
    }
}

/// Heuristic [`StructureDetector`].
///
/// The header is the first line with the modal field count. Following lines with no
/// numeric cells and blank cells (merged-cell spans) continue the header, up to three rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreambleDetector {
    delimiter: char,
}

impl PreambleDetector {
    /// Create a detector for lines split on `delimiter`.
    pub const fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    fn fields(&self, line: &str) -> Vec<String> {
        tokenize_line(line, self.delimiter)
            .into_iter()
            .map(|f| f.trim().to_string())
            .collect()
    }
}

fn modal_width(widths: &[usize]) -> usize {
    let mut best = (0, 0);
    for &w in widths {
        let count = widths.iter().filter(|&&x| x == w).count();
        if count > best.1 || (count == best.1 && w > best.0) {
            best = (w, count);
        }
    }
    best.0
}

fn is_header_like(fields: &[String]) -> bool {
    fields.iter().all(|f| !is_numeric(f)) && fields.iter().any(|f| !f.is_empty())
}

impl StructureDetector for PreambleDetector {
    fn detect_structure(&self, raw_lines: &[&str]) -> Result<StructureReport, StructureError> {
        let rows: Vec<Vec<String>> = raw_lines.iter().map(|l| self.fields(l)).collect();
        let widths: Vec<usize> = raw_lines
            .iter()
            .zip(&rows)
            .filter(|(line, _)| !line.trim().is_empty())
            .map(|(_, fields)| fields.len())
            .collect();
        if widths.is_empty() {
            return Err(StructureError("no non-blank lines".to_string()));
        }
        let modal = modal_width(&widths);

        let header_row = raw_lines
            .iter()
            .zip(&rows)
            .position(|(line, fields)| !line.trim().is_empty() && fields.len() == modal)
            .unwrap_or(0);

        let mut data_start_row = header_row + 1;
        while data_start_row < rows.len()
            && data_start_row - header_row < MAX_HEADER_ROWS
            && is_header_like(&rows[data_start_row])
            && (rows[data_start_row].iter().any(String::is_empty)
                || rows[data_start_row - 1].iter().any(String::is_empty))
        {
            data_start_row += 1;
        }
        if data_start_row >= rows.len() {
            // Nothing but header rows: treat the first as the whole header.
            data_start_row = (header_row + 1).min(rows.len());
        }

        let mut issues = Vec::new();
        if header_row > 0 {
            issues.push(format!("{header_row} preamble line(s) before the header"));
        }
        let has_multi_row_header = data_start_row - header_row > 1;
        if has_multi_row_header {
            issues.push(format!(
                "header spans rows {} to {}",
                header_row + 1,
                data_start_row
            ));
        }

        Ok(StructureReport {
            header_row,
            data_start_row,
            skip_rows: header_row,
            has_multi_row_header,
            multi_row_header_end: has_multi_row_header.then(|| data_start_row - 1),
            issues,
        })
    }

    fn merge_headers(&self, header_rows: &[&str]) -> Result<Vec<String>, StructureError> {
        if header_rows.is_empty() {
            return Err(StructureError("no header rows to merge".to_string()));
        }
        let mut rows: Vec<Vec<String>> = header_rows.iter().map(|l| self.fields(l)).collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);

        // Merged cells leave blanks to the right of the label; fill them in for every row
        // except the last.
        let last = rows.len() - 1;
        for row in &mut rows[..last] {
            row.resize(width, String::new());
            for col in 1..width {
                if row[col].is_empty() {
                    row[col] = row[col - 1].clone();
                }
            }
        }

        Ok((0..width)
            .map(|col| {
                let mut parts: Vec<&str> = Vec::new();
                for row in &rows {
                    if let Some(part) = row.get(col).map(String::as_str)
                        && !part.is_empty()
                        && parts.last() != Some(&part)
                    {
                        parts.push(part);
                    }
                }
                parts.join(" ")
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble() {
        let lines = ["Exported 2024-01-05", "", "id,name", "1,a", "2,b"];
        let report = PreambleDetector::new(',').detect_structure(&lines).unwrap();
        assert_eq!(report.header_row, 2);
        assert_eq!(report.data_start_row, 3);
        assert_eq!(report.skip_rows, 2);
        assert!(!report.has_multi_row_header);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_multi_row_header() {
        let lines = [
            "Region,Sales,,Costs,",
            ",Q1,Q2,Q1,Q2",
            "North,10,20,5,6",
            "South,11,21,6,7",
        ];
        let detector = PreambleDetector::new(',');
        let report = detector.detect_structure(&lines).unwrap();
        assert_eq!(report.header_row, 0);
        assert_eq!(report.data_start_row, 2);
        assert!(report.has_multi_row_header);
        assert_eq!(report.multi_row_header_end, Some(1));

        let merged = detector.merge_headers(&lines[..2]).unwrap();
        assert_eq!(
            merged,
            vec!["Region", "Sales Q1", "Sales Q2", "Costs Q1", "Costs Q2"]
        );
    }

    #[test]
    fn test_plain_file() {
        let lines = ["a,b", "1,2", "3,4"];
        let report = PreambleDetector::new(',').detect_structure(&lines).unwrap();
        assert_eq!(report, StructureReport {
            header_row: 0,
            data_start_row: 1,
            skip_rows: 0,
            has_multi_row_header: false,
            multi_row_header_end: None,
            issues: Vec::new(),
        });
    }

    #[test]
    fn test_empty_input() {
        assert!(PreambleDetector::new(',').detect_structure(&[]).is_err());
        assert!(PreambleDetector::new(',').merge_headers(&[]).is_err());
    }

    #[test]
    fn test_plan_load_options_multi_row() {
        let text = "Title\nRegion,Sales,,Costs,\n,Q1,Q2,Q1,Q2\nNorth,10,20,5,6\nSouth,1,2,3,4\n";
        let (options, warnings) = plan_load_options(&PreambleDetector::new(','), text, ',');
        assert_eq!(options.skip_rows, 3);
        assert_eq!(options.custom_headers.as_ref().map(Vec::len), Some(5));
        assert!(warnings.iter().any(|w| w.contains("preamble")));
    }

    struct Broken;

    impl StructureDetector for Broken {
        fn detect_structure(&self, _: &[&str]) -> Result<StructureReport, StructureError> {
            Err(StructureError("service unavailable".to_string()))
        }

        fn merge_headers(&self, _: &[&str]) -> Result<Vec<String>, StructureError> {
            Err(StructureError("service unavailable".to_string()))
        }
    }

    struct OutOfRange;

    impl StructureDetector for OutOfRange {
        fn detect_structure(&self, _: &[&str]) -> Result<StructureReport, StructureError> {
            Ok(StructureReport {
                header_row: 0,
                data_start_row: 99,
                ..StructureReport::default()
            })
        }

        fn merge_headers(&self, _: &[&str]) -> Result<Vec<String>, StructureError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_plan_load_options_degrades() {
        let (options, warnings) = plan_load_options(&Broken, "a,b\n1,2\n", ',');
        assert_eq!(options, LoadOptions::default());
        assert!(warnings[0].contains("service unavailable"));

        let (options, warnings) = plan_load_options(&OutOfRange, "a,b\n1,2\n", ',');
        assert_eq!(options, LoadOptions::default());
        assert!(warnings[0].contains("inconsistent"));
    }

    #[test]
    fn test_from_structure_without_merge() {
        let report = StructureReport {
            header_row: 2,
            data_start_row: 4,
            skip_rows: 2,
            has_multi_row_header: true,
            multi_row_header_end: Some(3),
            issues: Vec::new(),
        };
        assert_eq!(LoadOptions::from_structure(&report, None), LoadOptions::skip_rows(2));
        let merged = LoadOptions::from_structure(&report, Some(vec!["a".into()]));
        assert_eq!(merged.skip_rows, 4);
    }
}
