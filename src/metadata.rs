//! Data model shared by the loader and its callers.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::delimiter::DelimiterInfo;
use crate::encoding::EncodingInfo;
use crate::engine::{ColumnInfo, Quote, ReadOptions};
use crate::error::{RescueError, Result};
use crate::header::HeaderInfo;

/// An input file: raw bytes plus a display name. The name's extension selects the format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// Display name, usually the file name.
    pub name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl RawFile {
    /// Create a new `RawFile`.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, named after its file name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }

    /// Lowercased extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        let base = self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name);
        match base.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < base.len() => {
                Some(base[idx + 1..].to_ascii_lowercase())
            }
            _ => None,
        }
    }
}

/// How an input file is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Delimited text: decoded from bytes.
    Delimited,
    /// Spreadsheet workbook: one sheet extracted as delimited text.
    Workbook,
}

impl FileFormat {
    /// Classify a lowercased file extension.
    ///
    /// Returns `Ok(None)` for extensions that are not recognized; those are read as delimited
    /// text. Formats with no text extraction path fail with
    /// [`RescueError::UnsupportedFormat`].
    pub fn from_extension(extension: &str) -> Result<Option<Self>> {
        let hint = match extension {
            "csv" | "tsv" | "tab" | "txt" | "dat" | "psv" => return Ok(Some(Self::Delimited)),
            "xlsx" | "xlsm" | "xls" | "ods" => return Ok(Some(Self::Workbook)),
            "xlsb" => "binary workbooks are unreadable; save as .xlsx or export the sheet to CSV",
            "json" | "ndjson" | "jsonl" => "JSON is not tabular text; convert it to CSV first",
            "parquet" | "pq" | "arrow" | "feather" | "orc" | "avro" => {
                "columnar binary formats are not delimited text; export the data to CSV"
            }
            _ => return Ok(None),
        };
        Err(RescueError::UnsupportedFormat {
            extension: extension.to_string(),
            hint: hint.to_string(),
        })
    }
}

/// Caller overrides, typically produced by a structure-detection step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Lines to drop from the start of the text.
    pub skip_rows: usize,
    /// Replacement header. When set, it is written in front of the remaining lines.
    pub custom_headers: Option<Vec<String>>,
    /// Workbook sheet to load instead of the first one.
    pub sheet: Option<String>,
}

impl LoadOptions {
    /// Options that skip `rows` leading lines.
    pub fn skip_rows(rows: usize) -> Self {
        Self {
            skip_rows: rows,
            ..Self::default()
        }
    }

    /// Use `headers` as the header row.
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Load the named workbook sheet.
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }
}

/// A load strategy. Each is more permissive than the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Detected delimiter, standard quoting, type detection.
    Detected,
    /// As `Detected`, but every column is text.
    AllVarchar,
    /// Delimiter only. No quoting.
    Minimal,
    /// The engine detects the dialect itself.
    Auto,
}

impl Strategy {
    /// All strategies in the order they are attempted.
    pub const ALL: [Strategy; 4] = [
        Strategy::Detected,
        Strategy::AllVarchar,
        Strategy::Minimal,
        Strategy::Auto,
    ];

    /// Returns the strategy name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Strategy::Detected => "detected",
            Strategy::AllVarchar => "all_varchar",
            Strategy::Minimal => "minimal",
            Strategy::Auto => "auto",
        }
    }

    /// Engine read options for this strategy. Every strategy tolerates malformed rows and
    /// pads short ones.
    pub fn read_options(&self, delimiter: char) -> ReadOptions {
        let base = ReadOptions {
            delimiter: Some(delimiter),
            quote: Quote::Some(b'"'),
            escape: Some('"'),
            all_varchar: false,
            ignore_errors: true,
            null_padding: true,
            auto_detect_types: true,
        };
        match self {
            Strategy::Detected => base,
            Strategy::AllVarchar => ReadOptions {
                all_varchar: true,
                auto_detect_types: false,
                ..base
            },
            Strategy::Minimal => ReadOptions {
                quote: Quote::None,
                escape: None,
                ..base
            },
            Strategy::Auto => ReadOptions {
                delimiter: None,
                ..base
            },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    /// Name of the created table.
    pub table_name: String,
    /// Rows loaded, excluding the header.
    pub row_count: usize,
    /// Strategy that succeeded.
    pub strategy: Strategy,
    /// Detected encoding. Workbooks report UTF-8.
    pub encoding: EncodingInfo,
    /// Detected delimiter.
    pub delimiter: char,
    /// Columns after renaming.
    pub columns: Vec<ColumnInfo>,
    /// Every degraded decision made along the way.
    pub warnings: Vec<String>,
}

/// Detection results without loading anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Detected encoding.
    pub encoding: EncodingInfo,
    /// Inferred delimiter.
    pub delimiter: DelimiterInfo,
    /// Header detection result.
    pub header: HeaderInfo,
    /// Sanitized, unique column names from the header line.
    pub columns: Vec<String>,
    /// Non-blank lines after overrides, header included.
    pub line_count: usize,
    /// Warnings a load would report before attempting any strategy.
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(RawFile::new("data.CSV", b"".to_vec()).extension().as_deref(), Some("csv"));
        assert_eq!(RawFile::new("dir.v2/report", Vec::new()).extension(), None);
        assert_eq!(RawFile::new(".hidden", Vec::new()).extension(), None);
        assert_eq!(RawFile::new("trailing.", Vec::new()).extension(), None);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(FileFormat::from_extension("tsv").unwrap(), Some(FileFormat::Delimited));
        assert_eq!(FileFormat::from_extension("xls").unwrap(), Some(FileFormat::Workbook));
        assert_eq!(FileFormat::from_extension("log").unwrap(), None);
        assert!(matches!(
            FileFormat::from_extension("parquet"),
            Err(RescueError::UnsupportedFormat { ref extension, .. }) if extension == "parquet"
        ));
    }

    #[test]
    fn test_strategies_grow_more_permissive() {
        let detected = Strategy::Detected.read_options(';');
        assert_eq!(detected.delimiter, Some(';'));
        assert!(detected.auto_detect_types && detected.ignore_errors && detected.null_padding);

        let varchar = Strategy::AllVarchar.read_options(';');
        assert!(varchar.all_varchar && !varchar.auto_detect_types);

        let minimal = Strategy::Minimal.read_options(';');
        assert_eq!(minimal.quote, Quote::None);
        assert_eq!(minimal.escape, None);

        let auto = Strategy::Auto.read_options(';');
        assert_eq!(auto.delimiter, None);
        assert!(auto.ignore_errors && auto.null_padding);
    }

    #[test]
    fn test_strategy_names() {
        let names: Vec<&str> = Strategy::ALL.iter().map(Strategy::as_str).collect();
        assert_eq!(names, vec!["detected", "all_varchar", "minimal", "auto"]);
    }

    #[test]
    fn test_load_options_builders() {
        let options = LoadOptions::skip_rows(2).with_headers(["a", "b"]).with_sheet("Q1");
        assert_eq!(options.skip_rows, 2);
        assert_eq!(options.custom_headers, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(options.sheet.as_deref(), Some("Q1"));
    }
}
