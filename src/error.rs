use std::io;
use thiserror::Error;

use crate::engine::EngineError;
use crate::metadata::Strategy;

/// One failed load strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    /// The strategy that was attempted.
    pub strategy: Strategy,
    /// What the engine reported.
    pub error: EngineError,
}

/// Error type for loading operations.
#[derive(Error, Debug)]
pub enum RescueError {
    /// IO error while reading an input file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV error while writing extracted spreadsheet rows.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The workbook could not be opened or read.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// The file extension maps to a format with no text extraction path.
    #[error("Unsupported format '.{extension}': {hint}")]
    UnsupportedFormat {
        /// Lowercased file extension.
        extension: String,
        /// How to get the data into a loadable format.
        hint: String,
    },

    /// The workbook has no sheets.
    #[error("Workbook contains no sheets")]
    EmptySheet,

    /// The requested sheet does not exist.
    #[error("Sheet '{name}' not found (available: {})", available.join(", "))]
    SheetNotFound {
        /// The requested sheet name.
        name: String,
        /// Sheets present in the workbook.
        available: Vec<String>,
    },

    /// Every load strategy failed.
    #[error("Could not load table '{table}' after {} attempts: {source}", attempts.len())]
    LoadFailed {
        /// Target table name.
        table: String,
        /// Every attempt, in order.
        attempts: Vec<StrategyFailure>,
        /// The last strategy's failure.
        source: EngineError,
    },

    /// An engine operation outside the strategy sequence failed.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// No table of that name is registered.
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    /// Load options are unusable.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Result type alias for loading operations.
pub type Result<T> = std::result::Result<T, RescueError>;
