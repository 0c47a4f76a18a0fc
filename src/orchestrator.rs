//! Pipeline orchestrator for audex.
//!
//! Runs one asset end to end: locate, acquire, transcode, persist provenance,
//! finalize output. Any failing stage ends the run with that stage's status
//! code and message; later stages never run.

use crate::audio::{FfmpegTool, MediaTool, OutputFileRef, Transcoder};
use crate::config::{PipelineConfig, Settings};
use crate::error::Result;
use crate::finalize::{output_uri, OutputHandler};
use crate::input::{AssetReference, InputAcquirer};
use crate::provenance::{software_versions, ProvenanceBuilder, ProvenanceChain};
use crate::stage::{CallbackResponse, FailureKind, StageFailure};
use crate::storage::{DataLayout, ObjectStore, S3Store};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Identifier of this worker in provenance documents.
pub const WORKER_ID: &str = "audex-audio-extraction-worker";

const WORKER_DESCRIPTION: &str =
    "Worker that extracts audio files from video files (for further processing in other workers)";

/// States of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Locating,
    Acquiring,
    Transcoding,
    PersistingProvenance,
    FinalizingOutput,
    Done,
    Failed,
}

impl PipelineState {
    /// The state entered when the current one succeeds.
    pub fn next(self) -> Self {
        match self {
            PipelineState::Start => PipelineState::Locating,
            PipelineState::Locating => PipelineState::Acquiring,
            PipelineState::Acquiring => PipelineState::Transcoding,
            PipelineState::Transcoding => PipelineState::PersistingProvenance,
            PipelineState::PersistingProvenance => PipelineState::FinalizingOutput,
            PipelineState::FinalizingOutput => PipelineState::Done,
            PipelineState::Done => PipelineState::Done,
            PipelineState::Failed => PipelineState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub response: CallbackResponse,
    /// The persisted chain; `None` when the run ended before anything was persisted.
    pub provenance: Option<ProvenanceChain>,
    /// `Done` or `Failed`.
    pub state: PipelineState,
    /// The state in which the run failed, if it did.
    pub failed_in: Option<PipelineState>,
}

/// Tracks the current state of a run and logs transitions.
struct RunState {
    current: PipelineState,
}

impl RunState {
    fn new() -> Self {
        Self {
            current: PipelineState::Start,
        }
    }

    fn advance(&mut self) {
        let next = self.current.next();
        debug!("{:?} -> {:?}", self.current, next);
        self.current = next;
    }

    fn succeed(mut self, message: String, provenance: ProvenanceChain) -> PipelineRun {
        self.advance();
        info!("Run finished: {}", message);
        PipelineRun {
            response: CallbackResponse::success(message),
            provenance: Some(provenance),
            state: self.current,
            failed_in: None,
        }
    }

    fn fail(self, failure: StageFailure, provenance: Option<ProvenanceChain>) -> PipelineRun {
        error!("Run failed in {:?}: {}", self.current, failure);
        PipelineRun {
            response: failure.into(),
            provenance,
            state: PipelineState::Failed,
            failed_in: Some(self.current),
        }
    }
}

/// The main orchestrator for the audio extraction pipeline.
pub struct Orchestrator {
    config: PipelineConfig,
    layout: DataLayout,
    acquirer: InputAcquirer,
    transcoder: Transcoder,
    output_handler: OutputHandler,
}

impl Orchestrator {
    /// Create an orchestrator from validated settings, using ffmpeg and, when
    /// configured, an S3 store.
    pub fn new(settings: &Settings) -> Result<Self> {
        let config = settings.pipeline_config()?;
        let store: Option<Arc<dyn ObjectStore>> = match &config.remote_store {
            Some(remote) => Some(Arc::new(S3Store::new(&remote.endpoint, &remote.region)?)),
            None => None,
        };
        let layout = DataLayout::new(settings.data_base_dir());

        Ok(Self::with_components(
            config,
            layout,
            Arc::new(FfmpegTool::new()),
            store,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        config: PipelineConfig,
        layout: DataLayout,
        tool: Arc<dyn MediaTool>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            acquirer: InputAcquirer::new(layout.clone(), store.clone()),
            transcoder: Transcoder::new(tool, layout.clone()),
            output_handler: OutputHandler::new(layout.clone(), store),
            config,
            layout,
        }
    }

    /// Get the configuration snapshot.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the data layout.
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Process one input reference end to end.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn run(&self, input: &str) -> PipelineRun {
        let mut state = RunState::new();

        state.advance();
        if input.trim().is_empty() {
            return state.fail(
                StageFailure::new(FailureKind::MissingInput, "Error, no input file"),
                None,
            );
        }
        if !self.layout.validate_data_dirs() {
            return state.fail(
                StageFailure::new(FailureKind::EnvironmentNotReady, "Input & output dirs not ok"),
                None,
            );
        }

        let mut provenance = ProvenanceBuilder::open(
            WORKER_ID,
            WORKER_DESCRIPTION,
            json!({ "input_file_path": input }),
            self.config.snapshot(),
            software_versions(WORKER_ID),
        );

        state.advance();
        let asset = match self.acquirer.acquire(input, &self.config).await {
            Ok(acquired) => {
                info!("{}", acquired.message);
                if let Some(record) = acquired.provenance {
                    provenance.append(record);
                }
                acquired.payload
            }
            // nothing persisted for runs that never reached transcoding
            Err(failure) => return state.fail(failure, None),
        };

        state.advance();
        let output: OutputFileRef = match self.transcoder.transcode(&asset, &self.config).await {
            Ok(transcoded) => {
                info!("{}", transcoded.message);
                if let Some(record) = transcoded.provenance {
                    provenance.append(record);
                }
                transcoded.payload
            }
            Err(failure) => {
                // the acquisition record is kept even though the run fails here
                let chain = match self.persist_provenance(provenance, &asset) {
                    Ok(chain) => Some(chain),
                    Err(e) => {
                        warn!("{}", e);
                        None
                    }
                };
                return state.fail(failure, chain);
            }
        };

        state.advance();
        let chain = match self.persist_provenance(provenance, &asset) {
            Ok(chain) => chain,
            Err(failure) => return state.fail(failure, None),
        };

        state.advance();
        match self
            .output_handler
            .finalize(&asset, &output, &self.config)
            .await
        {
            Ok(done) => state.succeed(done.message, chain),
            Err(failure) => state.fail(failure, Some(chain)),
        }
    }

    fn persist_provenance(
        &self,
        provenance: ProvenanceBuilder,
        asset: &AssetReference,
    ) -> std::result::Result<ProvenanceChain, StageFailure> {
        let output_data = json!({
            "output_path": self.layout.base_output_dir(&asset.source_id).to_string_lossy(),
            "output_uri": output_uri(&self.config, &asset.source_id),
        });
        provenance
            .close_and_persist(output_data, &self.layout.provenance_file_path(&asset.source_id))
            .map_err(|e| {
                StageFailure::new(
                    FailureKind::ProvenanceFailure,
                    format!("Failed to persist provenance: {}", e),
                )
            })
    }
}
