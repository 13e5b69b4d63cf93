//! Registry of the tables the buffer pool can load pages from.

use crate::errors::Result;
use crate::storage::tuple::TupleDesc;
use crate::storage::DbFile;
use crate::TableId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no table with id {0}")]
    NoSuchTable(TableId),

    #[error("no table named {0:?}")]
    NoSuchName(String),
}

struct TableEntry {
    file: Arc<dyn DbFile>,
    name: String,
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<TableId, TableEntry>,
    by_name: HashMap<String, TableId>,
}

#[derive(Default)]
pub struct Catalog {
    tables: RwLock<Tables>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`. A table already using the name, or the
    /// same file id, is replaced.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str) {
        let mut tables = self.tables.write();
        let id = file.id();

        if let Some(old_id) = tables.by_name.remove(name) {
            tables.by_id.remove(&old_id);
        }
        if let Some(old) = tables.by_id.remove(&id) {
            tables.by_name.remove(&old.name);
        }

        tables.by_name.insert(name.to_string(), id);
        tables.by_id.insert(
            id,
            TableEntry {
                file,
                name: name.to_string(),
            },
        );
    }

    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.tables
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::NoSuchName(name.to_string()).into())
    }

    pub fn database_file(&self, table_id: TableId) -> Result<Arc<dyn DbFile>> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| entry.file.clone())
            .ok_or_else(|| CatalogError::NoSuchTable(table_id).into())
    }

    pub fn tuple_desc(&self, table_id: TableId) -> Result<Arc<TupleDesc>> {
        Ok(self.database_file(table_id)?.tuple_desc().clone())
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| CatalogError::NoSuchTable(table_id).into())
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().by_id.keys().copied().collect()
    }

    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.by_id.clear();
        tables.by_name.clear();
    }
}
