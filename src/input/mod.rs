//! Input acquisition.
//!
//! Resolves an input reference (S3 URI, local `.tar.gz` archive or local
//! file/directory) into a local media file and a stable source ID.

pub mod archive;
mod locator;

pub use locator::{
    extension_to_mime_type, get_asset_info, is_archive, locate, source_id_from_parent,
    ARCHIVE_SUFFIX,
};

use crate::config::PipelineConfig;
use crate::provenance::ActivityRecord;
use crate::stage::{FailureKind, StageFailure, StageOutput, StageResult};
use crate::storage::{is_safe_source_id, DataLayout, ObjectStore, S3Uri};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Input extensions the worker can transcode.
pub const TRANSCODABLE_EXTENSIONS: &[&str] = &[".mov", ".mp4"];

/// A resolved local input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub source_id: String,
    pub input_path: PathBuf,
    /// Extension with leading dot, e.g. `.mp4`.
    pub input_extension: String,
    /// File that was acquired: the archive for packaged inputs, otherwise
    /// the media file itself. This is what input cleanup removes.
    pub acquired_path: PathBuf,
}

impl AssetReference {
    pub fn new(source_id: impl Into<String>, input_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into();
        let (_, input_extension) = get_asset_info(&input_path.to_string_lossy());
        Self {
            source_id: source_id.into(),
            acquired_path: input_path.clone(),
            input_path,
            input_extension,
        }
    }

    /// Media extracted from `acquired_path`.
    pub fn extracted_from(mut self, acquired_path: impl Into<PathBuf>) -> Self {
        self.acquired_path = acquired_path.into();
        self
    }
}

/// Kind of input reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRef {
    S3(S3Uri),
    Archive(PathBuf),
    Local(PathBuf),
}

impl InputRef {
    pub fn classify(input: &str) -> crate::error::Result<Self> {
        if S3Uri::is_s3_uri(input) {
            Ok(InputRef::S3(S3Uri::parse(input)?))
        } else if is_archive(input) {
            Ok(InputRef::Archive(PathBuf::from(input)))
        } else {
            Ok(InputRef::Local(PathBuf::from(input)))
        }
    }
}

/// Stage that turns an input reference into a local [`AssetReference`].
#[derive(Clone)]
pub struct InputAcquirer {
    layout: DataLayout,
    store: Option<Arc<dyn ObjectStore>>,
}

impl InputAcquirer {
    pub fn new(layout: DataLayout, store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { layout, store }
    }

    /// Acquire the input and make sure the asset's output directories exist.
    #[instrument(skip(self, config), fields(input = %input))]
    pub async fn acquire(
        &self,
        input: &str,
        config: &PipelineConfig,
    ) -> StageResult<AssetReference> {
        let input_ref = InputRef::classify(input).map_err(|e| {
            error!("Invalid input reference: {}", e);
            StageFailure::new(FailureKind::AcquisitionFailure, e.to_string())
        })?;

        let output = match input_ref {
            InputRef::S3(uri) => self.download(&uri, config).await?,
            InputRef::Archive(path) => {
                let asset = self.unpack_archive(&path)?;
                StageOutput::new(format!("Processing tar.gz archive: {}", input), asset)
            }
            InputRef::Local(path) => {
                let asset = self.resolve_local(&path)?;
                StageOutput::new(format!("Processing local input: {}", input), asset)
            }
        };

        if output.payload.source_id.is_empty() {
            error!("Could not derive a source ID from {}", input);
            return Err(StageFailure::new(
                FailureKind::AcquisitionFailure,
                format!("Could not derive a source ID from {}", input),
            ));
        }
        if !is_safe_source_id(&output.payload.source_id) {
            error!("Rejecting source ID {:?} from {}", output.payload.source_id, input);
            return Err(StageFailure::new(
                FailureKind::AcquisitionFailure,
                format!("Invalid source ID {:?} from {}", output.payload.source_id, input),
            ));
        }

        self.layout
            .generate_output_dirs(&output.payload.source_id)
            .map_err(|e| {
                error!("Could not create output dirs: {}", e);
                StageFailure::new(
                    FailureKind::EnvironmentNotReady,
                    format!("Could not create output dirs: {}", e),
                )
            })?;

        info!(
            "Acquired {} as {}",
            output.payload.input_path.display(),
            output.payload.source_id
        );
        Ok(output)
    }

    async fn download(&self, uri: &S3Uri, config: &PipelineConfig) -> StageResult<AssetReference> {
        let store = self.store.as_ref().ok_or_else(|| {
            StageFailure::new(
                FailureKind::AcquisitionFailure,
                format!("Cannot download {}: no S3 endpoint configured", uri),
            )
        })?;

        let destination = self.layout.input_dir().join(uri.file_name());
        let mut provenance = None;

        if destination.exists() {
            info!("Using cached input file {}", destination.display());
        } else {
            let pending = ActivityRecord::start(
                "download",
                "Download the input file from S3",
                json!({ "input_uri": uri.to_string() }),
                config.snapshot(),
            );
            store.download(uri, &destination).await.map_err(|e| {
                error!("Download of {} failed: {}", uri, e);
                StageFailure::new(
                    FailureKind::AcquisitionFailure,
                    format!("Failed to download {}: {}", uri, e),
                )
            })?;
            provenance = Some(pending.finish(json!({
                "file_path": destination.to_string_lossy(),
            })));
        }

        let destination_str = destination.to_string_lossy().to_string();
        let asset = if is_archive(&destination_str) {
            self.unpack_archive(&destination)?
        } else {
            let (source_id, _) = get_asset_info(&destination_str);
            AssetReference::new(source_id, destination)
        };

        let output = StageOutput::new(format!("Downloaded {}", uri), asset);
        Ok(match provenance {
            Some(record) => output.with_provenance(record),
            None => output,
        })
    }

    fn unpack_archive(&self, archive_path: &Path) -> Result<AssetReference, StageFailure> {
        if !archive_path.is_file() {
            return Err(StageFailure::new(
                FailureKind::AcquisitionFailure,
                format!("Archive not found: {}", archive_path.display()),
            ));
        }

        let (source_id, _) = locate(&archive_path.to_string_lossy());
        if source_id.is_empty() {
            return Ok(AssetReference::new(source_id, archive_path));
        }
        // checked before extraction, the ID names the scratch directory
        if !is_safe_source_id(&source_id) {
            error!("Rejecting source ID {:?} from {}", source_id, archive_path.display());
            return Err(StageFailure::new(
                FailureKind::AcquisitionFailure,
                format!("Invalid source ID {:?} in {}", source_id, archive_path.display()),
            ));
        }

        let target = self.layout.asset_input_dir(&source_id);
        archive::extract(archive_path, &target)
            .and_then(|_| archive::find_media_file(&target))
            .map_err(|e| StageFailure::new(FailureKind::AcquisitionFailure, e.to_string()))?
            .map(|media| AssetReference::new(source_id, media).extracted_from(archive_path))
            .ok_or_else(|| {
                StageFailure::new(
                    FailureKind::AcquisitionFailure,
                    format!("No media file found in {}", archive_path.display()),
                )
            })
    }

    fn resolve_local(&self, path: &Path) -> Result<AssetReference, StageFailure> {
        if path.is_dir() {
            let media = archive::find_media_file(path)
                .map_err(|e| StageFailure::new(FailureKind::AcquisitionFailure, e.to_string()))?
                .ok_or_else(|| {
                    StageFailure::new(
                        FailureKind::AcquisitionFailure,
                        format!("No media file found in {}", path.display()),
                    )
                })?;
            let dir = format!("{}/", path.to_string_lossy().trim_end_matches('/'));
            return Ok(AssetReference::new(source_id_from_parent(&dir), media));
        }

        if !path.is_file() {
            return Err(StageFailure::new(
                FailureKind::AcquisitionFailure,
                format!("Input file not found: {}", path.display()),
            ));
        }

        Ok(AssetReference::new(
            source_id_from_parent(&path.to_string_lossy()),
            path,
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Object store double serving downloads from a local file.
    pub(crate) struct FakeStore {
        pub source: Option<PathBuf>,
        pub fail_upload: bool,
        pub downloads: Mutex<Vec<String>>,
        pub uploads: Mutex<Vec<(String, String)>>,
    }

    impl FakeStore {
        pub(crate) fn serving(source: Option<PathBuf>) -> Self {
            Self {
                source,
                fail_upload: false,
                downloads: Mutex::new(Vec::new()),
                uploads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn download(&self, uri: &S3Uri, destination: &Path) -> Result<()> {
            self.downloads.lock().unwrap().push(uri.to_string());
            match &self.source {
                Some(source) => {
                    std::fs::copy(source, destination)?;
                    Ok(())
                }
                None => Err(crate::error::AudexError::Storage("404 Not Found".to_string())),
            }
        }

        async fn upload(&self, bucket: &str, key: &str, source: &Path) -> Result<()> {
            if self.fail_upload {
                return Err(crate::error::AudexError::Storage("connection refused".to_string()));
            }
            assert!(source.is_file());
            self.uploads
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string()));
            Ok(())
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            output_sample_rate_hz: 16000,
            ..Default::default()
        }
    }

    fn layout_in(dir: &Path) -> DataLayout {
        let layout = DataLayout::new(dir);
        layout.create_data_dirs().unwrap();
        layout
    }

    #[test]
    fn test_classify() {
        assert!(matches!(InputRef::classify("s3://b/k.mp4").unwrap(), InputRef::S3(_)));
        assert!(matches!(InputRef::classify("/data/a/a.tar.gz").unwrap(), InputRef::Archive(_)));
        assert!(matches!(InputRef::classify("/data/a/a.mp4").unwrap(), InputRef::Local(_)));
        assert!(InputRef::classify("s3://bucket").is_err());
    }

    #[tokio::test]
    async fn test_acquire_s3_records_download() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        let source = dir.path().join("fixture.mp4");
        std::fs::write(&source, b"video").unwrap();
        let store = Arc::new(FakeStore::serving(Some(source)));
        let acquirer = InputAcquirer::new(layout.clone(), Some(store.clone() as Arc<dyn ObjectStore>));

        let output = acquirer
            .acquire("s3://bucket/in/program123__carrier456.mp4", &config())
            .await
            .unwrap();

        assert_eq!(output.payload.source_id, "program123__carrier456");
        assert_eq!(output.payload.input_extension, ".mp4");
        assert!(output.payload.input_path.is_file());
        let record = output.provenance.unwrap();
        assert_eq!(record.activity_name, "download");
        assert_eq!(record.input_data["input_uri"], "s3://bucket/in/program123__carrier456.mp4");
        assert_eq!(record.parameters["output_sample_rate_hz"], 16000);
        assert_eq!(output.payload.acquired_path, output.payload.input_path);
        assert!(layout.base_output_dir("program123__carrier456").join("audio").is_dir());
        assert_eq!(store.downloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_s3_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::serving(None));
        let acquirer = InputAcquirer::new(layout_in(dir.path()), Some(store as Arc<dyn ObjectStore>));

        let failure = acquirer
            .acquire("s3://bucket/in/asset.mp4", &config())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::AcquisitionFailure);
        assert_eq!(failure.status_code(), 500);
    }

    #[tokio::test]
    async fn test_acquire_s3_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = InputAcquirer::new(layout_in(dir.path()), None);
        let failure = acquirer
            .acquire("s3://bucket/in/asset.mp4", &config())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::AcquisitionFailure);
    }

    #[tokio::test]
    async fn test_acquire_local_file_uses_parent_segment() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        let asset_dir = dir.path().join("incoming").join("asset42");
        std::fs::create_dir_all(&asset_dir).unwrap();
        let file = asset_dir.join("video.mov");
        std::fs::write(&file, b"video").unwrap();

        let acquirer = InputAcquirer::new(layout, None);
        let output = acquirer
            .acquire(&file.to_string_lossy(), &config())
            .await
            .unwrap();

        assert_eq!(output.payload.source_id, "asset42");
        assert_eq!(output.payload.input_path, file);
        assert!(output.provenance.is_none());
    }

    #[tokio::test]
    async fn test_acquire_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        let asset_dir = dir.path().join("asset43");
        std::fs::create_dir_all(&asset_dir).unwrap();
        std::fs::write(asset_dir.join("clip.mp4"), b"video").unwrap();

        let acquirer = InputAcquirer::new(layout, None);
        let output = acquirer
            .acquire(&asset_dir.to_string_lossy(), &config())
            .await
            .unwrap();
        assert_eq!(output.payload.source_id, "asset43");
        assert_eq!(output.payload.input_path, asset_dir.join("clip.mp4"));
    }

    #[tokio::test]
    async fn test_acquire_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = InputAcquirer::new(layout_in(dir.path()), None);
        let missing = dir.path().join("asset").join("gone.mp4");
        let failure = acquirer
            .acquire(&missing.to_string_lossy(), &config())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::AcquisitionFailure);
    }

    #[tokio::test]
    async fn test_acquire_archive_uses_embedded_id() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path());
        let archive_path = dir.path().join("package.tar.gz");
        archive::tests::write_archive(
            &archive_path,
            &[
                ("metadata.json", br#"{"source_id": "prog__car"}"#),
                ("prog__car.mp4", b"video"),
            ],
        );

        let acquirer = InputAcquirer::new(layout.clone(), None);
        let output = acquirer
            .acquire(&archive_path.to_string_lossy(), &config())
            .await
            .unwrap();

        assert_eq!(output.payload.source_id, "prog__car");
        assert_eq!(
            output.payload.input_path,
            layout.asset_input_dir("prog__car").join("prog__car.mp4")
        );
        assert_eq!(output.payload.acquired_path, archive_path);
        assert!(output.provenance.is_none());
        assert!(output.message.contains("tar.gz"));
    }

    #[tokio::test]
    async fn test_acquire_archive_rejects_path_like_id() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let layout = layout_in(&data);
        let archive_path = data.join("input").join("package.tar.gz");
        archive::tests::write_archive(
            &archive_path,
            &[
                ("metadata.json", br#"{"source_id": "../../escaped"}"#),
                ("escaped.mp4", b"video"),
            ],
        );

        let acquirer = InputAcquirer::new(layout, None);
        let failure = acquirer
            .acquire(&archive_path.to_string_lossy(), &config())
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::AcquisitionFailure);
        assert!(!dir.path().join("escaped").exists());
        assert!(!data.join("escaped").exists());
    }
}
