//! Configuration module for audex.
//!
//! Settings are read once at start-up (config file plus environment) and
//! turned into an immutable [`PipelineConfig`] snapshot for the stages.

mod pipeline;
mod settings;

pub use pipeline::{OutputExtension, PipelineConfig, RemoteStore};
pub use settings::{
    AudioExtractionSettings, GeneralSettings, InputSettings, OutputSettings, S3Settings, Settings,
};
