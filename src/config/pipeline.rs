//! The immutable configuration snapshot passed into every pipeline stage.

use serde::{Deserialize, Serialize};

/// Audio container produced by the transcoder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputExtension {
    #[default]
    Wav,
    Mp3,
}

impl OutputExtension {
    /// File extension without the leading dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputExtension::Wav => "wav",
            OutputExtension::Mp3 => "mp3",
        }
    }
}

impl std::str::FromStr for OutputExtension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(OutputExtension::Wav),
            "mp3" => Ok(OutputExtension::Mp3),
            _ => Err(format!(
                "Please use one of: [wav, mp3] for AE_FILE_EXTENSION, not |{}|",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Location outputs are pushed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteStore {
    pub endpoint: String,
    pub bucket: String,
    /// Key prefix, without leading or trailing slashes.
    pub prefix: String,
    pub region: String,
}

/// Recognized pipeline options, fixed for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    pub convert_to_mono: bool,
    /// 0 means no resampling.
    pub output_sample_rate_hz: u32,
    pub output_extension: OutputExtension,
    pub delete_input_on_completion: bool,
    pub delete_output_on_completion: bool,
    pub transfer_output_on_completion: bool,
    pub remote_store: Option<RemoteStore>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            convert_to_mono: true,
            output_sample_rate_hz: 0,
            output_extension: OutputExtension::Wav,
            delete_input_on_completion: false,
            delete_output_on_completion: false,
            transfer_output_on_completion: false,
            remote_store: None,
        }
    }
}

impl PipelineConfig {
    /// JSON snapshot recorded as provenance parameters.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_extension_parse() {
        assert_eq!("wav".parse::<OutputExtension>().unwrap(), OutputExtension::Wav);
        assert_eq!("MP3".parse::<OutputExtension>().unwrap(), OutputExtension::Mp3);
        assert!("ogg".parse::<OutputExtension>().is_err());
    }

    #[test]
    fn test_snapshot_contains_audio_parameters() {
        let config = PipelineConfig {
            output_sample_rate_hz: 16000,
            ..Default::default()
        };
        let snapshot = config.snapshot();
        assert_eq!(snapshot["convert_to_mono"], true);
        assert_eq!(snapshot["output_sample_rate_hz"], 16000);
        assert_eq!(snapshot["output_extension"], "wav");
    }
}
