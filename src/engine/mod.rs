//! The query-engine collaborator.
//!
//! The loader never parses rows into a table itself. It hands sanitized text and a set of
//! [`ReadOptions`] to a [`QueryEngine`], which owns the resulting table. [`MemoryEngine`] is
//! the in-process implementation used by the CLI and the tests.

mod memory;
pub mod sniff;

use std::fmt;

use thiserror::Error;

use crate::field_type::ColumnType;

pub use memory::MemoryEngine;

/// Opaque failure reported by a query engine.
///
/// The loader does not interpret the message. A failure only decides whether the next load
/// strategy runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    /// Create an engine error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The engine's message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Quote character configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quote {
    /// No quoting.
    None,
    /// Quote with the specified character.
    Some(u8),
}

impl Default for Quote {
    fn default() -> Self {
        Quote::Some(b'"')
    }
}

impl Quote {
    /// Returns the quote character if set.
    pub fn char(&self) -> Option<u8> {
        match self {
            Quote::None => None,
            Quote::Some(c) => Some(*c),
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quote::None => write!(f, "none"),
            Quote::Some(c) => write!(f, "{}", *c as char),
        }
    }
}

/// How the engine should read source text into a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Field delimiter. `None` asks the engine to detect the dialect itself.
    pub delimiter: Option<char>,
    /// Quote character.
    pub quote: Quote,
    /// Escape character inside quoted fields. `None` uses the engine default.
    pub escape: Option<char>,
    /// Read every column as text.
    pub all_varchar: bool,
    /// Skip rows that cannot be parsed instead of failing.
    pub ignore_errors: bool,
    /// Pad short rows with nulls.
    pub null_padding: bool,
    /// Infer column types from the data.
    pub auto_detect_types: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: Some(','),
            quote: Quote::default(),
            escape: Some('"'),
            all_varchar: false,
            ignore_errors: false,
            null_padding: false,
            auto_detect_types: true,
        }
    }
}

/// One column of a table, as reported by [`QueryEngine::describe_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Whether the column contains (or may contain) nulls.
    pub nullable: bool,
}

/// Tabular store the loader creates tables in.
///
/// Implementations use interior mutability so one engine can serve concurrent loads of
/// different tables.
pub trait QueryEngine: Send + Sync {
    /// Parse `source` with `options` into table `name`, replacing any existing table of that
    /// name. Returns the number of rows loaded.
    fn create_or_replace_table(
        &self,
        name: &str,
        source: &str,
        options: &ReadOptions,
    ) -> Result<usize, EngineError>;

    /// Describe the columns of table `name`.
    fn describe_table(&self, name: &str) -> Result<Vec<ColumnInfo>, EngineError>;

    /// Rename one column.
    fn rename_column(&self, table: &str, old: &str, new: &str) -> Result<(), EngineError>;

    /// Drop table `name`. Dropping a missing table is not an error.
    fn drop_table(&self, name: &str) -> Result<(), EngineError>;
}

impl<E: QueryEngine + ?Sized> QueryEngine for std::sync::Arc<E> {
    fn create_or_replace_table(
        &self,
        name: &str,
        source: &str,
        options: &ReadOptions,
    ) -> Result<usize, EngineError> {
        (**self).create_or_replace_table(name, source, options)
    }

    fn describe_table(&self, name: &str) -> Result<Vec<ColumnInfo>, EngineError> {
        (**self).describe_table(name)
    }

    fn rename_column(&self, table: &str, old: &str, new: &str) -> Result<(), EngineError> {
        (**self).rename_column(table, old, new)
    }

    fn drop_table(&self, name: &str) -> Result<(), EngineError> {
        (**self).drop_table(name)
    }
}
