//! In-process [`QueryEngine`] that keeps tables as rows of [`Value`]s.

use std::io::Cursor;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use foldhash::{HashMap, HashMapExt, HashSet, HashSetExt};
use tracing::debug;

use super::sniff::{self, Dialect};
use super::{ColumnInfo, EngineError, QueryEngine, Quote, ReadOptions};
use crate::field_type::{ColumnType, Value, infer_column_type};

/// Rows sampled for type inference by default.
pub const DEFAULT_TYPE_SAMPLE_ROWS: usize = 1000;

/// Rows sampled for dialect auto-detection by default.
pub const DEFAULT_SNIFF_SAMPLE_ROWS: usize = 100;

#[derive(Debug, Clone)]
struct StoredTable {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
}

/// Tables held in memory behind a read/write lock.
///
/// Reads follow the usual CSV conventions: the first record is the header, empty header
/// cells are named `column{index}`, and repeated header cells get `_1`, `_2`, ... suffixes.
/// Column types are inferred from the first rows; afterwards every cell must cast to its
/// column type or the read fails.
#[derive(Debug)]
pub struct MemoryEngine {
    tables: RwLock<HashMap<String, StoredTable>>,
    type_sample_rows: usize,
    sniff_sample_rows: usize,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Create an empty engine with default sampling.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            type_sample_rows: DEFAULT_TYPE_SAMPLE_ROWS,
            sniff_sample_rows: DEFAULT_SNIFF_SAMPLE_ROWS,
        }
    }

    /// Set the number of rows sampled for type inference.
    pub fn type_sample_rows(&mut self, rows: usize) -> &mut Self {
        self.type_sample_rows = rows.max(1);
        self
    }

    /// Set the number of rows sampled for dialect auto-detection.
    pub fn sniff_sample_rows(&mut self, rows: usize) -> &mut Self {
        self.sniff_sample_rows = rows.max(1);
        self
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// A copy of the rows of table `name`.
    pub fn rows(&self, name: &str) -> Option<Vec<Vec<Value>>> {
        self.read().get(name).map(|t| t.rows.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredTable>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredTable>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve_dialect(&self, source: &str, options: &ReadOptions) -> Result<Dialect, EngineError> {
        match options.delimiter {
            Some(d) if d.is_ascii() => Ok(Dialect::new(d as u8, options.quote)),
            Some(d) => Err(EngineError::new(format!(
                "delimiter {d:?} is not a single-byte character"
            ))),
            None => Ok(sniff::sniff(source, self.sniff_sample_rows)
                .unwrap_or(Dialect::new(b',', Quote::default()))),
        }
    }

    fn parse(&self, source: &str, options: &ReadOptions) -> Result<StoredTable, EngineError> {
        let dialect = self.resolve_dialect(source, options)?;

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
                match options.escape {
                    Some(e) if e.is_ascii() && e as u8 != q => {
                        builder.escape(Some(e as u8)).double_quote(false);
                    }
                    Some(e) if !e.is_ascii() => {
                        return Err(EngineError::new(format!(
                            "escape {e:?} is not a single-byte character"
                        )));
                    }
                    _ => {}
                }
            }
        }

        let mut reader = builder.from_reader(Cursor::new(source.as_bytes()));
        let mut records = reader.records();

        let header = match records.next() {
            Some(record) => record?,
            None => return Err(EngineError::new("no columns found in source")),
        };
        let names = header_names(header.iter());
        let width = names.len();

        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        let (mut skipped, mut padded) = (0usize, 0usize);
        for (index, record) in records.enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(_) if options.ignore_errors => {
                    skipped += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let row_number = index + 2;

            let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
            if fields.len() > width {
                if options.ignore_errors {
                    skipped += 1;
                    continue;
                }
                return Err(EngineError::new(format!(
                    "row {row_number}: expected {width} fields, found {}",
                    fields.len()
                )));
            }
            if fields.len() < width {
                if options.null_padding {
                    fields.resize(width, String::new());
                    padded += 1;
                } else if options.ignore_errors {
                    skipped += 1;
                    continue;
                } else {
                    return Err(EngineError::new(format!(
                        "row {row_number}: expected {width} fields, found {}",
                        fields.len()
                    )));
                }
            }
            raw_rows.push(fields);
        }
        if skipped > 0 || padded > 0 {
            debug!(skipped, padded, "irregular rows");
        }

        let types: Vec<ColumnType> = if options.all_varchar || !options.auto_detect_types {
            vec![ColumnType::Text; width]
        } else {
            (0..width)
                .map(|col| {
                    infer_column_type(
                        raw_rows
                            .iter()
                            .take(self.type_sample_rows)
                            .map(|row| row[col].as_str()),
                    )
                })
                .collect()
        };

        let mut nullable = vec![false; width];
        let mut rows = Vec::with_capacity(raw_rows.len());
        for (index, raw) in raw_rows.iter().enumerate() {
            let mut row = Vec::with_capacity(width);
            for (col, cell) in raw.iter().enumerate() {
                let value = types[col].parse_value(cell).ok_or_else(|| {
                    EngineError::new(format!(
                        "could not convert {cell:?} to {} in column {:?} (data row {})",
                        types[col],
                        names[col],
                        index + 1
                    ))
                })?;
                nullable[col] |= value.is_null();
                row.push(value);
            }
            rows.push(row);
        }

        let columns = names
            .into_iter()
            .zip(types)
            .zip(nullable)
            .map(|((name, column_type), nullable)| ColumnInfo {
                name,
                column_type,
                nullable,
            })
            .collect();

        Ok(StoredTable { columns, rows })
    }
}

/// Name header cells, filling blanks and de-duplicating exact repeats.
fn header_names<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();

    for (index, cell) in cells.enumerate() {
        let base = if cell.trim().is_empty() {
            format!("column{index}")
        } else {
            cell.to_string()
        };
        if taken.insert(base.clone()) {
            names.push(base);
            continue;
        }
        let counter = counters.entry(base.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{base}_{counter}");
            if taken.insert(candidate.clone()) {
                names.push(candidate);
                break;
            }
        }
    }

    names
}

impl QueryEngine for MemoryEngine {
    fn create_or_replace_table(
        &self,
        name: &str,
        source: &str,
        options: &ReadOptions,
    ) -> Result<usize, EngineError> {
        let table = self.parse(source, options)?;
        let rows = table.rows.len();
        self.write().insert(name.to_string(), table);
        Ok(rows)
    }

    fn describe_table(&self, name: &str) -> Result<Vec<ColumnInfo>, EngineError> {
        self.read()
            .get(name)
            .map(|t| t.columns.clone())
            .ok_or_else(|| EngineError::new(format!("table {name:?} does not exist")))
    }

    fn rename_column(&self, table: &str, old: &str, new: &str) -> Result<(), EngineError> {
        let mut tables = self.write();
        let stored = tables
            .get_mut(table)
            .ok_or_else(|| EngineError::new(format!("table {table:?} does not exist")))?;

        if stored
            .columns
            .iter()
            .any(|c| c.name != old && c.name.eq_ignore_ascii_case(new))
        {
            return Err(EngineError::new(format!(
                "column {new:?} already exists in table {table:?}"
            )));
        }
        let column = stored
            .columns
            .iter_mut()
            .find(|c| c.name == old)
            .ok_or_else(|| {
                EngineError::new(format!("column {old:?} does not exist in table {table:?}"))
            })?;
        column.name = new.to_string();
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<(), EngineError> {
        self.write().remove(name);
        Ok(())
    }
}
