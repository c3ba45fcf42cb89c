//! Error types for rating-forge operations.
//!
//! Defines error types for the subsystems shared by all stages:
//! - Hosted model invocation
//! - Object storage (intermediate artifacts)
//! - Tabular data handling (CSV codec, projections)
//! - Warehouse (destination tables)

use thiserror::Error;

/// Errors that can occur while calling a hosted text model.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse model response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Model returned no predictions")]
    EmptyResponse,

    #[error("Model call timed out after {millis} ms")]
    Timeout { millis: u64 },

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur against object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object '{bucket}/{key}' not found")]
    NotFound { bucket: String, key: String },

    #[error("Invalid object location '{0}'")]
    InvalidLocation(String),

    #[error("Object storage request failed: {0}")]
    RequestFailed(String),

    #[error("Object storage API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while building, encoding or projecting tables.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Column '{column}' has type {actual}, expected a string column")]
    NotAStringColumn { column: String, actual: String },

    #[error("Column '{column}' has {actual} values, table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("CSV input has no header row")]
    MissingHeader,

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Errors that can occur against the destination warehouse.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Invalid table name '{0}': expected 'dataset.table' or 'project.dataset.table'")]
    InvalidTableName(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
