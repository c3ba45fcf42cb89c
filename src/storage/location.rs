//! Parsing of `gs://bucket/path` object URIs.

use std::fmt;

use crate::error::StorageError;

const GCS_SCHEME: &str = "gs://";

/// A bucket plus an object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    /// Parse a `gs://bucket/some/key` URI.
    ///
    /// The key is everything after the bucket segment; both parts must be
    /// non-empty.
    pub fn parse(uri: &str) -> Result<Self, StorageError> {
        let rest = uri
            .strip_prefix(GCS_SCHEME)
            .ok_or_else(|| StorageError::InvalidLocation(uri.to_string()))?;

        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidLocation(uri.to_string()))?;

        if bucket.is_empty() || key.is_empty() {
            return Err(StorageError::InvalidLocation(uri.to_string()));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", GCS_SCHEME, self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_key() {
        let loc = ObjectLocation::parse("gs://ml-bucket/pipeline_root/spec/pipeline_job.yaml")
            .expect("valid uri");
        assert_eq!(loc.bucket, "ml-bucket");
        assert_eq!(loc.key, "pipeline_root/spec/pipeline_job.yaml");
        assert_eq!(
            loc.to_string(),
            "gs://ml-bucket/pipeline_root/spec/pipeline_job.yaml"
        );
    }

    #[test]
    fn test_parse_rejects_bad_uris() {
        for uri in ["s3://bucket/key", "gs://bucket", "gs:///key", "gs://bucket/", "bucket/key"] {
            assert!(
                matches!(ObjectLocation::parse(uri), Err(StorageError::InvalidLocation(_))),
                "{} should be rejected",
                uri
            );
        }
    }
}
