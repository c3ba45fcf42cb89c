//! rating-forge: a three-stage movie-rating pipeline.
//!
//! Rows are fetched from a source table, rated one by one through a hosted
//! text model, and exported to a warehouse table. Stages hand data to each
//! other as CSV objects in object storage.

pub mod cli;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod stages;
pub mod storage;
pub mod table;
pub mod warehouse;

// Re-export commonly used error types
pub use error::{LlmError, StorageError, TableError, WarehouseError};
