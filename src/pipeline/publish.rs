//! Upload of compiled pipeline definitions.

use std::path::Path;

use super::definition::PipelineError;
use crate::storage::{ObjectLocation, ObjectStore};

/// Content type used for compiled definitions.
pub const DEFINITION_CONTENT_TYPE: &str = "application/x-yaml";

/// Upload the compiled definition at `local_path` to `gs_uri`.
///
/// The object key is everything in the URI after the bucket segment.
pub async fn publish_definition(
    store: &dyn ObjectStore,
    gs_uri: &str,
    local_path: &Path,
) -> Result<ObjectLocation, PipelineError> {
    let location = ObjectLocation::parse(gs_uri)?;
    let data = tokio::fs::read(local_path).await?;

    store
        .put(&location.bucket, &location.key, data, DEFINITION_CONTENT_TYPE)
        .await?;

    tracing::info!(
        source = %local_path.display(),
        destination = %location,
        "Pipeline definition uploaded"
    );
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::LocalObjectStore;

    #[tokio::test]
    async fn test_publish_uploads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = dir.path().join("pipeline_job.yaml");
        std::fs::write(&spec, "pipeline_name: test\n").expect("write spec");

        let store = LocalObjectStore::new(dir.path().join("objects"));
        let location = publish_definition(
            &store,
            "gs://ml-bucket/pipeline_root/pipeline_job.yaml",
            &spec,
        )
        .await
        .expect("publish");

        assert_eq!(location.key, "pipeline_root/pipeline_job.yaml");
        let uploaded = store
            .get("ml-bucket", "pipeline_root/pipeline_job.yaml")
            .await
            .expect("get");
        assert_eq!(uploaded, b"pipeline_name: test\n");
    }

    #[tokio::test]
    async fn test_publish_rejects_bad_uri() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path());
        let err = publish_definition(&store, "s3://bucket/key", &dir.path().join("missing.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Storage(StorageError::InvalidLocation(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_missing_local_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(dir.path());
        let err = publish_definition(&store, "gs://bucket/key.yaml", &dir.path().join("missing.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
