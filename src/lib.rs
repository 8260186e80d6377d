//! csv-rescue: robust loading for messy CSV, TSV and spreadsheet exports
//!
//! Files of unknown encoding, delimiter and layout are turned into clean, typed tables in a
//! query engine. Detection never fails: every stage degrades to a best guess and records a
//! warning instead.
//!
//! # Quick Start
//!
//! ```no_run
//! use csv_rescue::{LoadOptions, Loader, MemoryEngine};
//!
//! let loader = Loader::new(MemoryEngine::new());
//! let result = loader
//!     .load_path("export.csv", None, &LoadOptions::default())
//!     .unwrap();
//!
//! println!("Table: {} ({} rows)", result.table_name, result.row_count);
//! println!("Encoding: {}", result.encoding.encoding);
//! println!("Delimiter: {:?}", result.delimiter);
//! println!("Strategy: {}", result.strategy);
//! for warning in &result.warnings {
//!     println!("warning: {warning}");
//! }
//! ```
//!
//! # Pipeline
//!
//! 1. Classify the format by file extension; workbooks have one sheet extracted as text
//! 2. Detect the encoding from byte-order marks and byte patterns, then decode
//! 3. Sanitize: line endings, control and zero-width characters, smart quotes, quote repair
//! 4. Infer the delimiter with quote-aware counting and score the header row
//! 5. Apply caller overrides (skipped rows, replacement header)
//! 6. Create the table, falling back through four increasingly permissive strategies
//! 7. Rename columns to sanitized, unique identifiers and register the table
//!
//! The individual stages are public modules and can be used on their own:
//!
//! ```
//! use csv_rescue::{delimiter, encoding, sanitize};
//!
//! let bytes = b"\xFF\xFEa\0;\0b\0\n\x001\0;\x002\0";
//! let info = encoding::classify(bytes);
//! let text = sanitize::sanitize(&encoding::decode(bytes, &info));
//!
//! assert_eq!(info.encoding.as_str(), "UTF-16LE");
//! assert_eq!(delimiter::infer(&text).delimiter, ';');
//! ```

pub mod column_name;
pub mod delimiter;
pub mod encoding;
pub mod engine;
mod error;
pub mod field_type;
pub mod header;
mod loader;
mod metadata;
pub mod messy;
mod registry;
pub mod sanitize;
pub mod spreadsheet;
pub mod structure;
pub mod tokenizer;

pub use encoding::{Encoding, EncodingInfo};
pub use engine::{ColumnInfo, EngineError, MemoryEngine, QueryEngine, Quote, ReadOptions};
pub use error::{RescueError, Result, StrategyFailure};
pub use field_type::{ColumnType, Value};
pub use loader::{LoadJob, Loader};
pub use metadata::{Detection, FileFormat, LoadOptions, LoadResult, RawFile, Strategy};
pub use registry::{TableEntry, TableRegistry};
pub use structure::{PreambleDetector, StructureDetector, StructureReport, plan_load_options};
