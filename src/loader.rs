//! The load orchestrator.
//!
//! A load runs through `Detecting -> ExtractingText -> InferringMetadata ->
//! AttemptingStrategy(i)` and ends either with a registered table or with
//! [`RescueError::LoadFailed`] once every [`Strategy`] has been tried.

use std::borrow::Cow;
use std::path::Path;
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::column_name::{make_unique, sanitize_column_name, table_name_from_file};
use crate::delimiter::{self, DelimiterInfo};
use crate::encoding::{self, Encoding, EncodingInfo};
use crate::engine::{ColumnInfo, EngineError, QueryEngine};
use crate::error::{RescueError, Result, StrategyFailure};
use crate::header::{self, HeaderInfo};
use crate::metadata::{Detection, FileFormat, LoadOptions, LoadResult, RawFile, Strategy};
use crate::registry::{TableEntry, TableRegistry};
use crate::sanitize::sanitize;
use crate::spreadsheet::{self, ExtractOptions};
use crate::structure::{StructureDetector, plan_load_options};
use crate::tokenizer::{non_blank_lines, tokenize_line};

/// Line count above which a load is flagged as very large.
pub const DEFAULT_LARGE_ROW_THRESHOLD: usize = 1_000_000;

/// Rename passes made over columns whose sanitized name differs.
pub const DEFAULT_RENAME_PASSES: usize = 2;

/// Delimiter confidence below this, and header confidence at or below it, is reported.
const LOW_CONFIDENCE: f64 = 0.5;

/// One file in a [`Loader::load_many`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    /// The file to load.
    pub file: RawFile,
    /// Table name override.
    pub table_name: Option<String>,
    /// Caller overrides.
    pub options: LoadOptions,
}

impl LoadJob {
    /// A job with no overrides.
    pub fn new(file: RawFile) -> Self {
        Self {
            file,
            table_name: None,
            options: LoadOptions::default(),
        }
    }
}

/// Text and metadata produced before any strategy runs.
#[derive(Debug)]
struct Prepared {
    encoding: EncodingInfo,
    text: String,
    delimiter: DelimiterInfo,
    header: HeaderInfo,
    warnings: Vec<String>,
}

/// Loads messy delimited files and workbooks into a [`QueryEngine`].
///
/// # Example
///
/// ```
/// use csv_rescue::{LoadOptions, Loader, MemoryEngine, RawFile};
///
/// let loader = Loader::new(MemoryEngine::new());
/// let file = RawFile::new("prices.csv", "item;price\nTea;1,50\nCake;3,20\n");
/// let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();
///
/// assert_eq!(result.table_name, "prices");
/// assert_eq!(result.delimiter, ';');
/// assert_eq!(result.row_count, 2);
/// ```
#[derive(Debug)]
pub struct Loader<E> {
    engine: E,
    registry: TableRegistry,
    encoding_sample_bytes: usize,
    delimiter_sample_lines: usize,
    header_sample_rows: usize,
    large_row_threshold: usize,
    rename_passes: usize,
}

impl<E: QueryEngine> Loader<E> {
    /// Create a loader over `engine` with default settings.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            registry: TableRegistry::new(),
            encoding_sample_bytes: encoding::DEFAULT_SAMPLE_BYTES,
            delimiter_sample_lines: delimiter::DEFAULT_SAMPLE_LINES,
            header_sample_rows: header::DEFAULT_SAMPLE_ROWS,
            large_row_threshold: DEFAULT_LARGE_ROW_THRESHOLD,
            rename_passes: DEFAULT_RENAME_PASSES,
        }
    }

    /// Set the number of leading bytes inspected for encoding detection.
    pub fn encoding_sample_bytes(&mut self, bytes: usize) -> &mut Self {
        self.encoding_sample_bytes = bytes.max(1);
        self
    }

    /// Set the number of non-blank lines used for delimiter inference.
    pub fn delimiter_sample_lines(&mut self, lines: usize) -> &mut Self {
        self.delimiter_sample_lines = lines.max(1);
        self
    }

    /// Set the number of rows parsed for header detection.
    pub fn header_sample_rows(&mut self, rows: usize) -> &mut Self {
        self.header_sample_rows = rows.max(2);
        self
    }

    /// Set the line count above which a warning is recorded.
    pub fn large_row_threshold(&mut self, lines: usize) -> &mut Self {
        self.large_row_threshold = lines;
        self
    }

    /// Set how many passes are made over failed column renames.
    pub fn rename_passes(&mut self, passes: usize) -> &mut Self {
        self.rename_passes = passes.max(1);
        self
    }

    /// The engine tables are loaded into.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Loaded tables.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Load a file from disk.
    pub fn load_path<P: AsRef<Path>>(
        &self,
        path: P,
        table_name: Option<&str>,
        options: &LoadOptions,
    ) -> Result<LoadResult> {
        let file = RawFile::from_path(path)?;
        self.load_file(&file, table_name, options)
    }

    /// Load `file` into a table.
    ///
    /// The table is named after `table_name` when given, else after the file stem; both are
    /// sanitized like column names. Fails with [`RescueError::UnsupportedFormat`] before any
    /// engine call for formats with no text extraction path, and with
    /// [`RescueError::LoadFailed`] when every strategy fails.
    pub fn load_file(
        &self,
        file: &RawFile,
        table_name: Option<&str>,
        options: &LoadOptions,
    ) -> Result<LoadResult> {
        let table = resolve_table_name(file, table_name);
        let span = info_span!("load", file = %file.name, table = %table);
        let _enter = span.enter();

        let Prepared {
            encoding,
            text,
            delimiter,
            header: _,
            mut warnings,
        } = self.prepare(file, options)?;

        let (strategy, row_count, attempts) =
            self.attempt_strategies(&table, &text, delimiter.delimiter)?;
        if strategy != Strategy::Detected {
            let reasons: Vec<String> = attempts
                .iter()
                .map(|a| format!("{}: {}", a.strategy, a.error))
                .collect();
            warnings.push(format!(
                "Loaded with fallback strategy '{strategy}' after {} failed attempt(s) ({})",
                attempts.len(),
                reasons.join("; ")
            ));
        }
        if strategy == Strategy::Auto {
            warnings.push(format!(
                "Dialect left to the engine; '{}' is the delimiter inferred before loading",
                delimiter.display_name()
            ));
        }
        if let Some(warning) = row_loss_warning(&text, row_count) {
            warn!(rows = row_count, "{warning}");
            warnings.push(warning);
        }

        let columns = self.rename_columns(&table, &mut warnings);

        self.registry.insert(
            table.clone(),
            TableEntry {
                source_file_name: file.name.clone(),
                row_count,
                loaded_at: SystemTime::now(),
            },
        );
        info!(rows = row_count, strategy = %strategy, warnings = warnings.len(), "table loaded");

        Ok(LoadResult {
            table_name: table,
            row_count,
            strategy,
            encoding,
            delimiter: delimiter.delimiter,
            columns,
            warnings,
        })
    }

    /// Load several files in parallel.
    ///
    /// Results come back in job order. A job whose table name is already used by an earlier
    /// job in the batch fails with [`RescueError::InvalidOptions`] instead of racing it.
    pub fn load_many(&self, jobs: &[LoadJob]) -> Vec<Result<LoadResult>> {
        let names: Vec<String> = jobs
            .iter()
            .map(|job| resolve_table_name(&job.file, job.table_name.as_deref()))
            .collect();

        jobs.par_iter()
            .enumerate()
            .map(|(i, job)| {
                if names[..i].contains(&names[i]) {
                    return Err(RescueError::InvalidOptions(format!(
                        "table '{}' is loaded by more than one job in the batch",
                        names[i]
                    )));
                }
                self.load_file(&job.file, Some(&names[i]), &job.options)
            })
            .collect()
    }

    /// Run detection and overrides without loading anything.
    pub fn detect(&self, file: &RawFile, options: &LoadOptions) -> Result<Detection> {
        let span = info_span!("detect", file = %file.name);
        let _enter = span.enter();

        let prepared = self.prepare(file, options)?;
        let columns = non_blank_lines(&prepared.text)
            .next()
            .map(|line| {
                let raw: Vec<String> = tokenize_line(line, prepared.delimiter.delimiter)
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .collect();
                make_unique(&raw)
            })
            .unwrap_or_default();

        Ok(Detection {
            encoding: prepared.encoding,
            delimiter: prepared.delimiter,
            header: prepared.header,
            columns,
            line_count: non_blank_lines(&prepared.text).count(),
            warnings: prepared.warnings,
        })
    }

    /// Ask a structure detector how `file` is laid out and plan load options from its answer.
    ///
    /// `detector` is built for the delimiter inferred from the file. Only the detector's
    /// warnings are returned; detection warnings are reported again by the load itself.
    pub fn plan_structure<D, F>(
        &self,
        file: &RawFile,
        sheet: Option<&str>,
        detector: F,
    ) -> Result<(LoadOptions, Vec<String>)>
    where
        D: StructureDetector,
        F: FnOnce(char) -> D,
    {
        let options = LoadOptions {
            sheet: sheet.map(str::to_string),
            ..LoadOptions::default()
        };
        let prepared = self.prepare(file, &options)?;
        let delimiter = prepared.delimiter.delimiter;
        let (mut planned, warnings) =
            plan_load_options(&detector(delimiter), &prepared.text, delimiter);
        planned.sheet = options.sheet;
        debug!(
            skip_rows = planned.skip_rows,
            merged_headers = planned.custom_headers.is_some(),
            "structure planned"
        );
        Ok((planned, warnings))
    }

    /// Loaded tables, sorted by name.
    pub fn tables(&self) -> Vec<(String, TableEntry)> {
        self.registry.list()
    }

    /// Registry entry for one table.
    pub fn table(&self, name: &str) -> Option<TableEntry> {
        self.registry.get(name)
    }

    /// Columns of a loaded table.
    pub fn describe(&self, name: &str) -> Result<Vec<ColumnInfo>> {
        if !self.registry.contains(name) {
            return Err(RescueError::TableNotFound(name.to_string()));
        }
        Ok(self.engine.describe_table(name)?)
    }

    /// Drop a loaded table from the engine and the registry.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        if !self.registry.contains(name) {
            return Err(RescueError::TableNotFound(name.to_string()));
        }
        self.engine.drop_table(name)?;
        self.registry.remove(name);
        debug!(table = name, "table dropped");
        Ok(())
    }

    fn prepare(&self, file: &RawFile, options: &LoadOptions) -> Result<Prepared> {
        let mut warnings = Vec::new();

        debug!(stage = "Detecting", bytes = file.bytes.len());
        let format = match file.extension() {
            Some(ext) => match FileFormat::from_extension(&ext) {
                Ok(Some(format)) => format,
                Ok(None) => {
                    warnings.push(format!(
                        "Unrecognized extension '.{ext}'; reading '{}' as delimited text",
                        file.name
                    ));
                    FileFormat::Delimited
                }
                Err(err) => {
                    warn!(error = %err, "unsupported format");
                    return Err(err);
                }
            },
            None => {
                warnings.push(format!(
                    "'{}' has no extension; reading it as delimited text",
                    file.name
                ));
                FileFormat::Delimited
            }
        };

        debug!(stage = "ExtractingText", ?format);
        let (encoding, decoded) = match format {
            FileFormat::Workbook => {
                let sheet = spreadsheet::extract(
                    &file.bytes,
                    &ExtractOptions {
                        sheet: options.sheet.clone(),
                    },
                )?;
                if let Some(warning) = sheet.warning() {
                    warnings.push(warning);
                }
                debug!(sheet = %sheet.sheet_name, sheets = sheet.sheet_count, "sheet extracted");
                (EncodingInfo::default(), sheet.text)
            }
            FileFormat::Delimited => {
                if let Some(sheet) = &options.sheet {
                    warnings.push(format!(
                        "Sheet '{sheet}' ignored: '{}' is not a workbook",
                        file.name
                    ));
                }
                let info = encoding::classify_with_sample(&file.bytes, self.encoding_sample_bytes);
                match info.encoding {
                    Encoding::Windows1252 => warnings.push(
                        "Decoded as Windows-1252; check accented and currency characters"
                            .to_string(),
                    ),
                    Encoding::ISO8859_1 => warnings.push(
                        "Encoding could not be determined; decoded as ISO-8859-1".to_string(),
                    ),
                    _ => {}
                }
                debug!(encoding = %info.encoding, bom = info.has_bom, "encoding classified");
                (info, encoding::decode(&file.bytes, &info))
            }
        };
        let sanitized = sanitize(&decoded);

        debug!(stage = "InferringMetadata");
        let delimiter = delimiter::infer_with_sample(&sanitized, self.delimiter_sample_lines);
        let header =
            header::detect_with_sample(&sanitized, delimiter.delimiter, self.header_sample_rows);
        debug!(
            delimiter = %delimiter.display_name(),
            delimiter_confidence = delimiter.confidence,
            has_header = header.has_header,
            header_confidence = header.confidence,
            "metadata inferred"
        );

        if delimiter.delimiter == ';' {
            warnings.push(
                "Semicolon delimiter detected; decimal commas are kept as text".to_string(),
            );
        }
        if delimiter.confidence < LOW_CONFIDENCE {
            warnings.push(format!(
                "Low confidence ({:.2}) in delimiter '{}'",
                delimiter.confidence,
                delimiter.display_name()
            ));
        }
        // A single row scores exactly LOW_CONFIDENCE: the header is assumed, not detected.
        if !header.has_header || header.confidence <= LOW_CONFIDENCE {
            warnings.push(format!(
                "Header detection uncertain ({:.2}); the first row is used as the header",
                header.confidence
            ));
        }
        let line_count = bytecount::count(sanitized.as_bytes(), b'\n');
        if line_count > self.large_row_threshold {
            warnings.push(format!(
                "Very large file ({line_count} lines); loading may be slow"
            ));
        }

        let text = apply_overrides(&sanitized, delimiter.delimiter, options, &mut warnings)?;

        Ok(Prepared {
            encoding,
            text,
            delimiter,
            header,
            warnings,
        })
    }

    fn attempt_strategies(
        &self,
        table: &str,
        text: &str,
        delimiter: char,
    ) -> Result<(Strategy, usize, Vec<StrategyFailure>)> {
        let mut attempts = Vec::new();

        for strategy in Strategy::ALL {
            debug!(stage = "AttemptingStrategy", strategy = %strategy);
            match self
                .engine
                .create_or_replace_table(table, text, &strategy.read_options(delimiter))
            {
                Ok(rows) => return Ok((strategy, rows, attempts)),
                Err(error) => {
                    warn!(strategy = %strategy, error = %error, "load strategy failed");
                    attempts.push(StrategyFailure { strategy, error });
                }
            }
        }

        let source = attempts
            .last()
            .map(|a| a.error.clone())
            .unwrap_or_else(|| EngineError::new("no load strategy was attempted"));
        Err(RescueError::LoadFailed {
            table: table.to_string(),
            attempts,
            source,
        })
    }

    /// Rename columns to their sanitized, unique names. Failures become warnings.
    fn rename_columns(&self, table: &str, warnings: &mut Vec<String>) -> Vec<ColumnInfo> {
        let mut columns = match self.engine.describe_table(table) {
            Ok(columns) => columns,
            Err(err) => {
                warn!(error = %err, "could not describe table");
                warnings.push(format!("Could not read column names to sanitize them: {err}"));
                return Vec::new();
            }
        };

        let targets = make_unique(&columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>());
        let mut pending: Vec<(usize, String, Option<EngineError>)> = targets
            .into_iter()
            .enumerate()
            .filter(|(i, target)| columns[*i].name != *target)
            .map(|(i, target)| (i, target, None))
            .collect();

        // Later passes pick up renames that collided with a name freed by an earlier one.
        for pass in 0..self.rename_passes {
            if pending.is_empty() {
                break;
            }
            let mut failed = Vec::new();
            for (i, target, _) in pending {
                match self.engine.rename_column(table, &columns[i].name, &target) {
                    Ok(()) => {
                        debug!(from = %columns[i].name, to = %target, "column renamed");
                        columns[i].name = target;
                    }
                    Err(err) => {
                        debug!(pass, column = %columns[i].name, error = %err, "rename failed");
                        failed.push((i, target, Some(err)));
                    }
                }
            }
            pending = failed;
        }

        for (i, target, err) in pending {
            let reason = err.map(|e| e.to_string()).unwrap_or_default();
            warn!(
                column = %columns[i].name,
                target = %target,
                error = %reason,
                "column rename failed"
            );
            warnings.push(format!(
                "Could not rename column '{}' to '{target}': {reason}",
                columns[i].name
            ));
        }

        columns
    }
}

/// Compare the rows an engine kept with the non-blank data lines it was given.
///
/// Fewer rows means lines were dropped as malformed or swallowed by an open quote.
fn row_loss_warning(text: &str, row_count: usize) -> Option<String> {
    let data_lines = non_blank_lines(text).count().saturating_sub(1);
    (row_count < data_lines).then(|| {
        format!(
            "{} of {data_lines} source line(s) were skipped or merged into other rows",
            data_lines - row_count
        )
    })
}

fn resolve_table_name(file: &RawFile, table_name: Option<&str>) -> String {
    match table_name.filter(|n| !n.trim().is_empty()) {
        Some(name) => sanitize_column_name(name),
        None => table_name_from_file(&file.name),
    }
}

/// Drop `skip_rows` lines and, when custom headers are given, write them as the first line.
fn apply_overrides(
    text: &str,
    delimiter: char,
    options: &LoadOptions,
    warnings: &mut Vec<String>,
) -> Result<String> {
    if options.skip_rows == 0 && options.custom_headers.is_none() {
        return Ok(text.to_string());
    }

    let body: String = text
        .split_inclusive('\n')
        .skip(options.skip_rows)
        .collect();
    if options.skip_rows > 0 && non_blank_lines(&body).next().is_none() {
        return Err(RescueError::InvalidOptions(format!(
            "skipping {} rows leaves no data",
            options.skip_rows
        )));
    }

    let Some(headers) = &options.custom_headers else {
        return Ok(body);
    };
    if headers.is_empty() {
        return Err(RescueError::InvalidOptions(
            "custom headers must not be empty".to_string(),
        ));
    }

    if let Some(first) = non_blank_lines(&body).next() {
        let fields = tokenize_line(first, delimiter).len();
        if fields != headers.len() {
            warnings.push(format!(
                "{} custom headers supplied but the data has {fields} columns",
                headers.len()
            ));
        }
    }

    let header_line: Vec<Cow<'_, str>> = headers
        .iter()
        .map(|h| quote_field(h, delimiter))
        .collect();
    let mut out = header_line.join(&delimiter.to_string());
    out.push('\n');
    out.push_str(&body);
    Ok(out)
}

fn quote_field(field: &str, delimiter: char) -> Cow<'_, str> {
    if field.contains(delimiter) || field.contains(['"', '\'', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, ReadOptions};
    use crate::field_type::ColumnType;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` table creations, then delegates to a `MemoryEngine`.
    #[derive(Default)]
    struct FlakyEngine {
        failures: usize,
        calls: AtomicUsize,
        seen: Mutex<Vec<ReadOptions>>,
        inner: MemoryEngine,
        reject_renames_to: Option<String>,
    }

    impl QueryEngine for FlakyEngine {
        fn create_or_replace_table(
            &self,
            name: &str,
            source: &str,
            options: &ReadOptions,
        ) -> std::result::Result<usize, EngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(options.clone());
            if call < self.failures {
                return Err(EngineError::new(format!("boom {call}")));
            }
            self.inner.create_or_replace_table(name, source, options)
        }

        fn describe_table(&self, name: &str) -> std::result::Result<Vec<ColumnInfo>, EngineError> {
            self.inner.describe_table(name)
        }

        fn rename_column(
            &self,
            table: &str,
            old: &str,
            new: &str,
        ) -> std::result::Result<(), EngineError> {
            if self.reject_renames_to.as_deref() == Some(new) {
                return Err(EngineError::new("rename rejected"));
            }
            self.inner.rename_column(table, old, new)
        }

        fn drop_table(&self, name: &str) -> std::result::Result<(), EngineError> {
            self.inner.drop_table(name)
        }
    }

    fn flaky(failures: usize) -> FlakyEngine {
        FlakyEngine {
            failures,
            ..FlakyEngine::default()
        }
    }

    #[test]
    fn test_fallback_order() {
        let loader = Loader::new(flaky(2));
        let file = RawFile::new("data.csv", "a,b\n1,2\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();

        assert_eq!(result.strategy, Strategy::Minimal);
        assert!(result.warnings.iter().any(|w| w.contains("fallback strategy 'minimal'")));

        let seen = loader.engine().seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], Strategy::Detected.read_options(','));
        assert_eq!(seen[1], Strategy::AllVarchar.read_options(','));
        assert_eq!(seen[2], Strategy::Minimal.read_options(','));
    }

    #[test]
    fn test_auto_strategy_reports_inferred_delimiter() {
        let loader = Loader::new(flaky(3));
        let file = RawFile::new("data.csv", "a;b\n1;2\n3;4\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();

        assert_eq!(result.strategy, Strategy::Auto);
        assert_eq!(result.row_count, 2);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("Dialect left to the engine") && w.contains("';'"))
        );
        let seen = loader.engine().seen.lock().unwrap();
        assert_eq!(seen[3].delimiter, None);
    }

    #[test]
    fn test_all_strategies_fail() {
        let loader = Loader::new(flaky(usize::MAX));
        let file = RawFile::new("data.csv", "a,b\n1,2\n");
        let err = loader.load_file(&file, None, &LoadOptions::default()).unwrap_err();

        match err {
            RescueError::LoadFailed {
                table,
                attempts,
                source,
            } => {
                assert_eq!(table, "data");
                let order: Vec<Strategy> = attempts.iter().map(|a| a.strategy).collect();
                assert_eq!(order, Strategy::ALL.to_vec());
                assert_eq!(source.message(), "boom 3");
            }
            other => panic!("expected LoadFailed, got {other:?}"),
        }
        assert!(loader.tables().is_empty());
    }

    #[test]
    fn test_unsupported_format_makes_no_attempts() {
        let loader = Loader::new(flaky(0));
        let file = RawFile::new("data.parquet", b"PAR1\x00\x00".to_vec());
        let err = loader.load_file(&file, None, &LoadOptions::default()).unwrap_err();

        assert!(matches!(err, RescueError::UnsupportedFormat { .. }));
        assert_eq!(loader.engine().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_columns_are_sanitized() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("people.csv", "First Name,first_name,2nd Score\nA,B,1\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();

        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["First_Name", "first_name_1", "_2nd_Score"]);
        assert_eq!(result.columns[2].column_type, ColumnType::Integer);
        assert_eq!(loader.describe("people").unwrap(), result.columns);
    }

    #[test]
    fn test_rename_needs_second_pass() {
        // "a b" wants "a_b", which is only free once "a_b" has become "a_b_1".
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("t.csv", "a b,a_b\n1,2\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();
        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a_b", "a_b_1"]);
        assert!(!result.warnings.iter().any(|w| w.contains("rename")));
    }

    #[test]
    fn test_rename_failure_is_a_warning() {
        let engine = FlakyEngine {
            reject_renames_to: Some("First_Name".to_string()),
            ..FlakyEngine::default()
        };
        let loader = Loader::new(engine);
        let file = RawFile::new("t.csv", "First Name,age\nA,1\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();

        assert_eq!(result.columns[0].name, "First Name");
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("Could not rename column 'First Name'"))
        );
    }

    #[test]
    fn test_table_name_override() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("x.csv", "a\n1\n");
        let result = loader
            .load_file(&file, Some("Q1 Sales"), &LoadOptions::default())
            .unwrap();
        assert_eq!(result.table_name, "Q1_Sales");
        assert_eq!(loader.table("Q1_Sales").unwrap().source_file_name, "x.csv");
    }

    #[test]
    fn test_skip_rows_and_custom_headers() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new(
            "report.csv",
            "Quarterly report\nregion,units\nsub,total\nNorth,10\nSouth,20\n",
        );
        let options = LoadOptions::skip_rows(3).with_headers(["Region Name", "Units"]);
        let result = loader.load_file(&file, None, &options).unwrap();

        assert_eq!(result.row_count, 2);
        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Region_Name", "Units"]);
    }

    #[test]
    fn test_custom_header_count_mismatch_warns() {
        let mut warnings = Vec::new();
        let options = LoadOptions::default().with_headers(["a", "b", "c"]);
        let text = apply_overrides("1,2\n3,4\n", ',', &options, &mut warnings).unwrap();
        assert_eq!(text, "a,b,c\n1,2\n3,4\n");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("3 custom headers"));
    }

    #[test]
    fn test_overrides_validation() {
        let mut warnings = Vec::new();
        assert!(matches!(
            apply_overrides("a\n1\n", ',', &LoadOptions::skip_rows(5), &mut warnings),
            Err(RescueError::InvalidOptions(_))
        ));
        let empty = LoadOptions::default().with_headers(Vec::<String>::new());
        assert!(matches!(
            apply_overrides("a\n1\n", ',', &empty, &mut warnings),
            Err(RescueError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_quote_field() {
        assert_eq!(quote_field("plain", ','), "plain");
        assert_eq!(quote_field("a,b", ','), "\"a,b\"");
        assert_eq!(quote_field("say \"hi\"", ';'), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field("a,b", ';'), "a,b");
    }

    #[test]
    fn test_drop_and_describe_unknown_table() {
        let loader = Loader::new(MemoryEngine::new());
        assert!(matches!(loader.drop_table("nope"), Err(RescueError::TableNotFound(_))));
        assert!(matches!(loader.describe("nope"), Err(RescueError::TableNotFound(_))));

        let file = RawFile::new("t.csv", "a\n1\n");
        loader.load_file(&file, None, &LoadOptions::default()).unwrap();
        loader.drop_table("t").unwrap();
        assert!(loader.table("t").is_none());
        assert!(loader.engine().table_names().is_empty());
    }

    #[test]
    fn test_unknown_extension_warns() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("export.log", "a,b\n1,2\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("Unrecognized extension '.log'")));
    }

    #[test]
    fn test_detect_only() {
        let loader = Loader::new(flaky(0));
        let file = RawFile::new("d.tsv", "id\tFull Name\n1\tAda\n2\tGrace\n");
        let detection = loader.detect(&file, &LoadOptions::default()).unwrap();

        assert_eq!(detection.delimiter.delimiter, '\t');
        assert!(detection.header.has_header);
        assert_eq!(detection.columns, vec!["id", "Full_Name"]);
        assert_eq!(detection.line_count, 3);
        assert_eq!(loader.engine().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plan_structure() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("r.csv", "Monthly report\n\nid,qty\n1,5\n2,6\n");
        let (options, warnings) = loader
            .plan_structure(&file, None, crate::structure::PreambleDetector::new)
            .unwrap();
        assert_eq!(options, LoadOptions::skip_rows(2));
        assert!(warnings.iter().any(|w| w.contains("preamble")));

        let result = loader.load_file(&file, None, &options).unwrap();
        assert_eq!(result.row_count, 2);
        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "qty"]);
    }

    #[test]
    fn test_row_loss_warning() {
        assert_eq!(row_loss_warning("a,b\n1,2\n\n3,4\n", 2), None);
        assert_eq!(row_loss_warning("a,b\n", 0), None);
        assert_eq!(row_loss_warning("", 0), None);
        assert_eq!(
            row_loss_warning("a,b\n1,2\n3,4\n5,6\n", 1).as_deref(),
            Some("2 of 3 source line(s) were skipped or merged into other rows")
        );
    }

    #[test]
    fn test_overlong_row_is_reported() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("t.csv", "a,b,c\n1,2,3\n4,5,6,7\n8,9,10\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();

        assert_eq!(result.strategy, Strategy::Detected);
        assert_eq!(result.row_count, 2);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.starts_with("1 of 3 source line(s) were skipped"))
        );
    }

    #[test]
    fn test_clean_load_has_no_loss_warning() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("t.csv", "a,b\n1,2\n\n3,4\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();

        assert_eq!(result.row_count, 2);
        assert!(!result.warnings.iter().any(|w| w.contains("skipped or merged")));
    }

    #[test]
    fn test_single_row_header_is_reported() {
        let loader = Loader::new(MemoryEngine::new());
        let file = RawFile::new("wide.csv", "alpha,beta,gamma,delta,epsilon,zeta,eta\n");
        let result = loader.load_file(&file, None, &LoadOptions::default()).unwrap();

        assert_eq!(result.row_count, 0);
        assert_eq!(result.columns.len(), 7);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("Header detection uncertain (0.50)"))
        );
    }

    #[test]
    fn test_load_many_rejects_duplicate_names() {
        let loader = Loader::new(MemoryEngine::new());
        let jobs = vec![
            LoadJob::new(RawFile::new("a.csv", "x\n1\n")),
            LoadJob::new(RawFile::new("b.csv", "y\n2\n3\n")),
            LoadJob::new(RawFile::new("dir/a.csv", "z\n4\n")),
        ];
        let results = loader.load_many(&jobs);

        assert_eq!(results[0].as_ref().unwrap().row_count, 1);
        assert_eq!(results[1].as_ref().unwrap().row_count, 2);
        assert!(matches!(results[2], Err(RescueError::InvalidOptions(_))));
        assert_eq!(loader.tables().len(), 2);
    }
}
