//! Output handling after a successful transcode: transfer, then cleanup.

use crate::audio::OutputFileRef;
use crate::config::PipelineConfig;
use crate::input::AssetReference;
use crate::stage::{FailureKind, StageFailure, StageOutput, StageResult};
use crate::storage::{object_key, DataLayout, ObjectStore};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Message reported for a fully successful run.
pub const SUCCESS_MESSAGE: &str = "Successfully applied model";

/// URI under which an asset's outputs are (or would be) stored remotely.
pub fn output_uri(config: &PipelineConfig, source_id: &str) -> String {
    match &config.remote_store {
        Some(store) => format!(
            "s3://{}/{}",
            store.bucket,
            object_key(&[&store.prefix, source_id])
        ),
        None => String::new(),
    }
}

/// Stage that transfers the output and cleans up local files.
#[derive(Clone)]
pub struct OutputHandler {
    layout: DataLayout,
    store: Option<Arc<dyn ObjectStore>>,
}

impl OutputHandler {
    pub fn new(layout: DataLayout, store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { layout, store }
    }

    /// Transfer, delete output, delete input; in that order, each gated by its flag.
    #[instrument(skip_all, fields(source_id = %asset.source_id))]
    pub async fn finalize(
        &self,
        asset: &AssetReference,
        output: &OutputFileRef,
        config: &PipelineConfig,
    ) -> StageResult<()> {
        if config.transfer_output_on_completion {
            self.transfer_output(asset, output, config).await?;
        }

        if config.delete_output_on_completion && !self.layout.delete_local_output(&asset.source_id)
        {
            warn!("Could not delete output files: {}", output.output_dir.display());
        }

        if !self.layout.delete_input_file(
            &asset.acquired_path,
            &asset.source_id,
            config.delete_input_on_completion,
        ) {
            return Err(StageFailure::new(
                FailureKind::InputCleanupFailure,
                "Applied model, but could not delete the input file",
            ));
        }

        Ok(StageOutput::new(SUCCESS_MESSAGE, ()))
    }

    async fn transfer_output(
        &self,
        asset: &AssetReference,
        output: &OutputFileRef,
        config: &PipelineConfig,
    ) -> Result<(), StageFailure> {
        let transfer_failed =
            || StageFailure::new(FailureKind::TransferFailure, "Failed to transfer output to S3");

        let (Some(store), Some(remote)) = (&self.store, &config.remote_store) else {
            warn!("TRANSFER_ON_COMPLETION configured without all the necessary S3 settings");
            return Err(transfer_failed());
        };

        let relative = output
            .path
            .strip_prefix(&output.output_dir)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| {
                output
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            });
        let key = object_key(&[&remote.prefix, &asset.source_id, &relative]);

        info!("Transferring {} to s3://{}/{}", output.path.display(), remote.bucket, key);
        store
            .upload(&remote.bucket, &key, &output.path)
            .await
            .map_err(|e| {
                error!("Transfer failed: {}", e);
                transfer_failed()
            })
    }
}
