//! Destination tables for exported results.
//!
//! A warehouse table is addressed by a fully qualified `project.dataset.table`
//! name (the project may be omitted and taken from the stage context). Writes
//! are full replacements: prior contents are discarded, never merged.

pub mod parquet_store;

use std::fmt;

use async_trait::async_trait;

use crate::error::WarehouseError;
use crate::table::Table;

pub use parquet_store::ParquetWarehouse;

/// Fully qualified warehouse table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableName {
    /// Parse `dataset.table` or `project.dataset.table`.
    ///
    /// Every segment must be non-empty and contain only ASCII alphanumerics,
    /// `_` or `-`.
    pub fn parse(name: &str, default_project: &str) -> Result<Self, WarehouseError> {
        let invalid = || WarehouseError::InvalidTableName(name.to_string());
        let parts: Vec<&str> = name.trim().split('.').collect();

        let (project, dataset, table) = match parts.as_slice() {
            [dataset, table] => (default_project, *dataset, *table),
            [project, dataset, table] => (*project, *dataset, *table),
            _ => return Err(invalid()),
        };

        let valid_segment = |s: &str| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };
        if ![project, dataset, table].into_iter().all(valid_segment) {
            return Err(invalid());
        }

        Ok(Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Read and full-replace access to warehouse tables.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Read a table, keeping at most `limit` rows in stored order.
    async fn read_table(&self, name: &TableName, limit: Option<usize>)
        -> Result<Table, WarehouseError>;

    /// Replace the table's contents (and schema) with `data`.
    async fn replace_table(&self, name: &TableName, data: &Table) -> Result<(), WarehouseError>;
}
