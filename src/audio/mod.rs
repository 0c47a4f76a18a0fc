//! Audio extraction.
//!
//! The [`Transcoder`] stage drives an external [`MediaTool`] (ffmpeg) to turn a
//! video input into a wav or mp3 file.

mod extract;
mod tool;

pub use extract::{extraction_args, is_transcodable, OutputFileRef, Transcoder, TRANSCODE_ACTIVITY};
pub use tool::{FfmpegTool, MediaTool, ToolOutput};

#[cfg(test)]
pub(crate) use extract::tests::FakeTool;
