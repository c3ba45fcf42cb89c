//! Parquet-file warehouse.
//!
//! Each table is one ZSTD-compressed Parquet file at
//! `<root>/<project>/<dataset>/<table>.parquet`. Replacing a table writes a
//! temporary file next to the destination and renames it over the old one.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;
use async_trait::async_trait;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::{TableName, Warehouse};
use crate::error::WarehouseError;
use crate::table::Table;

/// Warehouse storing each table as a Parquet file under `root`.
#[derive(Debug, Clone)]
pub struct ParquetWarehouse {
    root: PathBuf,
}

impl ParquetWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// On-disk location of a table.
    pub fn table_path(&self, name: &TableName) -> PathBuf {
        self.root
            .join(&name.project)
            .join(&name.dataset)
            .join(format!("{}.parquet", name.table))
    }
}

fn join_error(e: tokio::task::JoinError) -> WarehouseError {
    WarehouseError::Io(std::io::Error::other(e))
}

fn write_table_file(path: &Path, data: &Table) -> Result<(), WarehouseError> {
    let parent = path
        .parent()
        .ok_or_else(|| WarehouseError::InvalidTableName(path.display().to_string()))?;
    std::fs::create_dir_all(parent)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build();

    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    let file = tmp.reopen()?;
    let batch = data.batch();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    tmp.persist(path).map_err(|e| WarehouseError::Io(e.error))?;
    Ok(())
}

fn read_table_file(path: &Path, limit: Option<usize>) -> Result<Table, WarehouseError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    let batch = match limit {
        Some(limit) if limit < batch.num_rows() => batch.slice(0, limit),
        _ => batch,
    };
    Ok(Table::new(batch))
}

#[async_trait]
impl Warehouse for ParquetWarehouse {
    async fn read_table(
        &self,
        name: &TableName,
        limit: Option<usize>,
    ) -> Result<Table, WarehouseError> {
        let path = self.table_path(name);
        if !path.exists() {
            return Err(WarehouseError::TableNotFound(name.to_string()));
        }

        let table = tokio::task::spawn_blocking(move || read_table_file(&path, limit))
            .await
            .map_err(join_error)??;
        tracing::debug!(table = %name, rows = table.num_rows(), "Warehouse table read");
        Ok(table)
    }

    async fn replace_table(&self, name: &TableName, data: &Table) -> Result<(), WarehouseError> {
        let path = self.table_path(name);
        let target = path.clone();
        let data = data.clone();
        let rows = data.num_rows();
        tokio::task::spawn_blocking(move || write_table_file(&target, &data))
            .await
            .map_err(join_error)??;

        tracing::info!(
            table = %name,
            path = %path.display(),
            rows = rows,
            "Warehouse table replaced"
        );
        Ok(())
    }
}
