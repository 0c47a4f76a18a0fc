//! Storage: the local data layout and the remote object store.

mod layout;
mod s3;

pub use layout::{DataLayout, OutputType};
pub(crate) use layout::is_safe_source_id;
pub use s3::S3Store;

use crate::error::{AudexError, Result};
use async_trait::async_trait;
use std::path::Path;

/// A parsed `s3://bucket/key` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    /// Whether `input` looks like an S3 URI at all.
    pub fn is_s3_uri(input: &str) -> bool {
        input.starts_with("s3://")
    }

    pub fn parse(input: &str) -> Result<Self> {
        let rest = input
            .strip_prefix("s3://")
            .ok_or_else(|| AudexError::InvalidS3Uri(input.to_string()))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| AudexError::InvalidS3Uri(input.to_string()))?;
        if bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(AudexError::InvalidS3Uri(input.to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl std::fmt::Display for S3Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Remote object storage used for input download and output transfer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object to `destination`. Either the whole file appears or nothing does.
    async fn download(&self, uri: &S3Uri, destination: &Path) -> Result<()>;

    /// Upload a single local file under `key`.
    async fn upload(&self, bucket: &str, key: &str, source: &Path) -> Result<()>;
}

/// Join key segments with single slashes.
pub fn object_key(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_uri() {
        let uri = S3Uri::parse("s3://bucket/in/program123__carrier456.mp4").unwrap();
        assert_eq!(uri.bucket, "bucket");
        assert_eq!(uri.key, "in/program123__carrier456.mp4");
        assert_eq!(uri.file_name(), "program123__carrier456.mp4");
        assert_eq!(uri.to_string(), "s3://bucket/in/program123__carrier456.mp4");
    }

    #[test]
    fn test_parse_invalid_s3_uri() {
        assert!(S3Uri::parse("s3://bucket").is_err());
        assert!(S3Uri::parse("s3:///key").is_err());
        assert!(S3Uri::parse("s3://bucket/dir/").is_err());
        assert!(S3Uri::parse("https://bucket/key").is_err());
        assert!(!S3Uri::is_s3_uri("/data/input/file.mp4"));
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key(&["/assets/", "abc", "audio/abc.wav"]), "assets/abc/audio/abc.wav");
        assert_eq!(object_key(&["", "abc"]), "abc");
    }
}
