//! S3-compatible object store over presigned URLs.

use super::{ObjectStore, S3Uri};
use crate::error::{AudexError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use rusty_s3::{Bucket, Credentials, S3Action, UrlStyle};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use url::Url;

/// Lifetime of presigned request URLs.
const PRESIGN_TTL: Duration = Duration::from_secs(3600);

/// Object store client for an S3-compatible endpoint.
pub struct S3Store {
    endpoint: Url,
    region: String,
    credentials: Option<Credentials>,
    client: reqwest::Client,
}

impl S3Store {
    /// Create a client; credentials are read from `AWS_ACCESS_KEY_ID` and
    /// `AWS_SECRET_ACCESS_KEY`.
    pub fn new(endpoint: &str, region: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AudexError::Config(format!("Invalid S3 endpoint {}: {}", endpoint, e)))?;
        Ok(Self {
            endpoint,
            region: region.to_string(),
            credentials: Credentials::from_env(),
            client: reqwest::Client::new(),
        })
    }

    /// Whether credentials were found in the environment.
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn bucket(&self, name: &str) -> Result<Bucket> {
        Bucket::new(
            self.endpoint.clone(),
            UrlStyle::Path,
            name.to_string(),
            self.region.clone(),
        )
        .map_err(|e| AudexError::Storage(format!("Invalid bucket {}: {}", name, e)))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self, destination), fields(uri = %uri))]
    async fn download(&self, uri: &S3Uri, destination: &Path) -> Result<()> {
        let bucket = self.bucket(&uri.bucket)?;
        let url = bucket
            .get_object(self.credentials.as_ref(), &uri.key)
            .sign(PRESIGN_TTL);

        let response = self.client.get(url).send().await?.error_for_status()?;

        let dir = destination
            .parent()
            .ok_or_else(|| AudexError::InvalidInput(format!("No parent for {}", destination.display())))?;
        std::fs::create_dir_all(dir)?;

        // Stream into a temp file next to the destination, then rename.
        let (file, temp_path) = tempfile::NamedTempFile::new_in(dir)?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut stream = response.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        temp_path
            .persist(destination)
            .map_err(|e| AudexError::Io(e.error))?;

        info!("Downloaded {} bytes to {}", written, destination.display());
        Ok(())
    }

    #[instrument(skip(self, source), fields(bucket = %bucket, key = %key))]
    async fn upload(&self, bucket: &str, key: &str, source: &Path) -> Result<()> {
        let body = tokio::fs::read(source).await?;
        debug!("Uploading {} ({} bytes)", source.display(), body.len());

        let url = self
            .bucket(bucket)?
            .put_object(self.credentials.as_ref(), key)
            .sign(PRESIGN_TTL);

        self.client
            .put(url)
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        info!("Uploaded {} to s3://{}/{}", source.display(), bucket, key);
        Ok(())
    }
}
