//! Object storage for intermediate artifacts.
//!
//! Stages hand tables to each other as CSV objects addressed by a bucket and
//! a key. The [`ObjectStore`] trait is the only seam; two implementations are
//! provided:
//! - **LocalObjectStore**: a directory tree, `<root>/<bucket>/<key>`
//! - **GcsObjectStore**: the Cloud Storage JSON API over HTTPS
//!
//! # Usage
//!
//! ```rust,ignore
//! use rating_forge::storage::{LocalObjectStore, ObjectStore};
//!
//! let store = LocalObjectStore::new("/tmp/objects");
//! store.put("my-bucket", "data/input.csv", bytes, "text/csv").await?;
//! let bytes = store.get("my-bucket", "data/input.csv").await?;
//! ```

pub mod gcs;
pub mod local;
pub mod location;

use async_trait::async_trait;

use crate::error::StorageError;

pub use gcs::GcsObjectStore;
pub use local::LocalObjectStore;
pub use location::ObjectLocation;

/// Read/replace access to objects addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full contents of an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Upload an object, replacing any existing object at the same key.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
