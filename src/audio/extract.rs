//! Audio extraction from video inputs.

use super::tool::MediaTool;
use crate::config::PipelineConfig;
use crate::input::{extension_to_mime_type, AssetReference, TRANSCODABLE_EXTENSIONS};
use crate::provenance::ActivityRecord;
use crate::stage::{FailureKind, StageFailure, StageOutput, StageResult};
use crate::storage::DataLayout;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Activity name recorded for the transform.
pub const TRANSCODE_ACTIVITY: &str = "video2audio";

/// Location of the produced audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFileRef {
    pub path: PathBuf,
    /// Root of all outputs of the asset.
    pub output_dir: PathBuf,
}

/// Whether the worker accepts inputs with this extension (leading dot).
pub fn is_transcodable(extension: &str) -> bool {
    TRANSCODABLE_EXTENSIONS.contains(&extension.to_lowercase().as_str())
}

/// Build the tool arguments for extracting audio from `input` into `destination`.
pub fn extraction_args(input: &Path, destination: &Path, config: &PipelineConfig) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string_lossy().to_string()];
    if config.convert_to_mono {
        args.extend(["-ac".to_string(), "1".to_string()]);
    }
    if config.output_sample_rate_hz != 0 {
        args.extend(["-ar".to_string(), config.output_sample_rate_hz.to_string()]);
    }
    args.push(destination.to_string_lossy().to_string());
    args
}

/// Idempotent video-to-audio transform.
#[derive(Clone)]
pub struct Transcoder {
    tool: Arc<dyn MediaTool>,
    layout: DataLayout,
}

impl Transcoder {
    pub fn new(tool: Arc<dyn MediaTool>, layout: DataLayout) -> Self {
        Self { tool, layout }
    }

    /// Transcode the asset unless its output already exists.
    #[instrument(skip_all, fields(source_id = %asset.source_id))]
    pub async fn transcode(
        &self,
        asset: &AssetReference,
        config: &PipelineConfig,
    ) -> StageResult<OutputFileRef> {
        info!(
            "Running audio extraction for {} (extension: {})",
            asset.input_path.display(),
            asset.input_extension
        );

        if !is_transcodable(&asset.input_extension) {
            error!("input with extension {} is not transcodable", asset.input_extension);
            return Err(StageFailure::new(
                FailureKind::UnsupportedFormat,
                format!(
                    "input with extension {:?} is not transcodable",
                    asset.input_extension
                ),
            ));
        }

        let destination = self
            .layout
            .audio_file_path(&asset.source_id, config.output_extension);
        let output = OutputFileRef {
            path: destination.clone(),
            output_dir: self.layout.base_output_dir(&asset.source_id),
        };

        if destination.exists() {
            info!("{} already exists, skipping transcode", destination.display());
            return Ok(StageOutput::new("Output already exists", output));
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StageFailure::new(
                    FailureKind::TranscodeFailure,
                    format!("Could not create {}: {}", parent.display(), e),
                )
            })?;
        }

        let args = extraction_args(&asset.input_path, &destination, config);
        let pending = ActivityRecord::start(
            TRANSCODE_ACTIVITY,
            "converted a video file to audio format",
            json!({
                "input_file_path": asset.input_path.to_string_lossy(),
                "mime_type": extension_to_mime_type(&asset.input_extension),
            }),
            config.snapshot(),
        );

        if let Err(e) = self.tool.run(&args).await {
            error!("Transcode failed: {}", e);
            self.discard_partial(&destination);
            return Err(StageFailure::new(
                FailureKind::TranscodeFailure,
                format!("Transcode failed: {}", e),
            ));
        }

        if !destination.is_file() {
            error!("{} reported success but produced no output", self.tool.program());
            return Err(StageFailure::new(
                FailureKind::TranscodeFailure,
                format!("Transcode produced no output at {}", destination.display()),
            ));
        }

        let record = pending.finish(json!({
            "output_file_path": destination.to_string_lossy(),
            "mime_type": extension_to_mime_type(&format!(".{}", config.output_extension)),
        }));
        info!(
            "Transcode of {} successful in {} ms: {}",
            asset.input_extension,
            record.processing_time_ms,
            destination.display()
        );

        Ok(StageOutput::new(
            format!("Successfully transcoded {}", asset.source_id),
            output,
        )
        .with_provenance(record))
    }

    /// Remove a half-written output so a re-run does not treat it as done.
    fn discard_partial(&self, destination: &Path) {
        if destination.exists() {
            if let Err(e) = std::fs::remove_file(destination) {
                warn!("Could not remove partial output {}: {}", destination.display(), e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::OutputExtension;
    use crate::error::{AudexError, Result};
    use crate::audio::ToolOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Tool double that writes the destination (last argument) or fails.
    pub(crate) struct FakeTool {
        pub fail: bool,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeTool {
        pub(crate) fn succeeding() -> Self {
            Self {
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MediaTool for FakeTool {
        fn program(&self) -> &str {
            "fake-ffmpeg"
        }

        async fn run(&self, args: &[String]) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            let destination = args.last().cloned().unwrap_or_default();
            if self.fail {
                // leave a partial file behind like a crashed encoder would
                std::fs::write(&destination, b"partial")?;
                return Err(AudexError::ToolFailed("fake-ffmpeg exited with 1".to_string()));
            }
            std::fs::write(&destination, b"RIFF")?;
            Ok(ToolOutput::default())
        }
    }

    fn asset_in(dir: &Path, name: &str) -> AssetReference {
        let path = dir.join(name);
        std::fs::write(&path, b"video").unwrap();
        let (source_id, _) = crate::input::get_asset_info(name);
        AssetReference::new(source_id, path)
    }

    #[test]
    fn test_extraction_args() {
        let config = PipelineConfig {
            convert_to_mono: true,
            output_sample_rate_hz: 16000,
            ..Default::default()
        };
        let args = extraction_args(Path::new("/in/a.mp4"), Path::new("/out/a.wav"), &config);
        assert_eq!(args, vec!["-i", "/in/a.mp4", "-ac", "1", "-ar", "16000", "/out/a.wav"]);

        let plain = PipelineConfig {
            convert_to_mono: false,
            output_sample_rate_hz: 0,
            ..Default::default()
        };
        let args = extraction_args(Path::new("/in/a.mp4"), Path::new("/out/a.mp3"), &plain);
        assert_eq!(args, vec!["-i", "/in/a.mp4", "/out/a.mp3"]);
    }

    #[test]
    fn test_is_transcodable() {
        assert!(is_transcodable(".mp4"));
        assert!(is_transcodable(".MOV"));
        assert!(!is_transcodable(".txt"));
        assert!(!is_transcodable(".mkv"));
        assert!(!is_transcodable(""));
    }

    #[tokio::test]
    async fn test_transcode_records_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeTool::succeeding());
        let transcoder = Transcoder::new(tool.clone(), DataLayout::new(dir.path()));
        let asset = asset_in(dir.path(), "clip.mp4");
        let config = PipelineConfig {
            output_sample_rate_hz: 16000,
            ..Default::default()
        };

        let output = transcoder.transcode(&asset, &config).await.unwrap();
        assert!(output.payload.path.ends_with("output/clip/audio/clip.wav"));
        assert!(output.payload.path.is_file());

        let record = output.provenance.unwrap();
        assert_eq!(record.activity_name, TRANSCODE_ACTIVITY);
        assert_eq!(record.parameters["convert_to_mono"], true);
        assert_eq!(record.parameters["output_sample_rate_hz"], 16000);
        assert_eq!(record.input_data["mime_type"], "video/mp4");
        assert_eq!(record.output_data["mime_type"], "audio/wav");
        assert_eq!(tool.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transcode_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeTool::succeeding());
        let transcoder = Transcoder::new(tool.clone(), DataLayout::new(dir.path()));
        let asset = asset_in(dir.path(), "clip.mov");
        let config = PipelineConfig::default();

        let first = transcoder.transcode(&asset, &config).await.unwrap();
        let second = transcoder.transcode(&asset, &config).await.unwrap();

        assert!(first.provenance.is_some());
        assert!(second.provenance.is_none());
        assert_eq!(first.payload, second.payload);
        assert_eq!(tool.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_extension_never_invokes_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeTool::succeeding());
        let transcoder = Transcoder::new(tool.clone(), DataLayout::new(dir.path()));

        for name in ["notes.txt", "clip.mkv", "song.mp3", "noext"] {
            let asset = asset_in(dir.path(), name);
            let failure = transcoder
                .transcode(&asset, &PipelineConfig::default())
                .await
                .unwrap_err();
            assert_eq!(failure.kind, FailureKind::UnsupportedFormat);
            assert_eq!(failure.status_code(), 500);
            assert!(failure.message.contains("not transcodable"));
        }
        assert_eq!(tool.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tool_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeTool::failing());
        let layout = DataLayout::new(dir.path());
        let transcoder = Transcoder::new(tool.clone(), layout.clone());
        let asset = asset_in(dir.path(), "clip.mp4");
        let config = PipelineConfig {
            output_extension: OutputExtension::Mp3,
            ..Default::default()
        };

        let failure = transcoder.transcode(&asset, &config).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::TranscodeFailure);
        assert!(!layout.audio_file_path("clip", OutputExtension::Mp3).exists());

        // a retry runs the tool again instead of trusting the partial file
        let _ = transcoder.transcode(&asset, &config).await;
        assert_eq!(tool.call_count(), 2);
    }
}
