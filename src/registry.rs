//! Bookkeeping for loaded tables.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use foldhash::{HashMap, HashMapExt};

/// What the registry remembers about one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Name of the file the table was loaded from.
    pub source_file_name: String,
    /// Rows loaded.
    pub row_count: usize,
    /// When the load finished.
    pub loaded_at: SystemTime,
}

/// Table name to [`TableEntry`], guarded by a single mutex.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: Mutex<HashMap<String, TableEntry>>,
}

impl TableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TableEntry>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a table, replacing any previous entry. Returns the replaced entry.
    pub fn insert(&self, name: impl Into<String>, entry: TableEntry) -> Option<TableEntry> {
        self.lock().insert(name.into(), entry)
    }

    /// Forget a table. Returns its entry if it was registered.
    pub fn remove(&self, name: &str) -> Option<TableEntry> {
        self.lock().remove(name)
    }

    /// Look up a table.
    pub fn get(&self, name: &str) -> Option<TableEntry> {
        self.lock().get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// All entries, sorted by table name.
    pub fn list(&self) -> Vec<(String, TableEntry)> {
        let mut entries: Vec<(String, TableEntry)> = self
            .lock()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no tables are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
