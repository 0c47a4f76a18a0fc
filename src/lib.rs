//! Audex - audio extraction worker
//!
//! Extracts the audio track from a video asset, records what was done in a
//! provenance document and optionally hands the result to S3.
//!
//! # Architecture
//!
//! - `config` - Settings file, environment overrides and the pipeline snapshot
//! - `input` - Input acquisition (S3 download, tar.gz archives, local files)
//! - `audio` - Transcoding through an external media tool
//! - `provenance` - Activity records and the persisted provenance chain
//! - `finalize` - Output transfer and cleanup
//! - `storage` - Data directory layout and object storage
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use audex::config::Settings;
//! use audex::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     settings.validate()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let run = orchestrator.run("s3://bucket/in/program123__carrier456.mp4").await;
//!     println!("{}: {}", run.response.state, run.response.message);
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod finalize;
pub mod input;
pub mod orchestrator;
pub mod provenance;
pub mod stage;
pub mod storage;

pub use error::{AudexError, Result};
