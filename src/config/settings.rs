//! Configuration settings for audex.

use super::pipeline::{OutputExtension, PipelineConfig, RemoteStore};
use crate::error::{AudexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub input: InputSettings,
    pub output: OutputSettings,
    pub s3: S3Settings,
    pub audio_extraction: AudioExtractionSettings,
}

/// General worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Mounted directory holding the `input/` and `output/` trees.
    pub data_base_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_base_dir: "~/.audex/data".to_string(),
        }
    }
}

/// Input handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Default input reference (S3 URI, archive or local path).
    pub uri: String,
    /// Remove the local input file once the run has completed.
    pub delete_on_completion: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            uri: String::new(),
            delete_on_completion: true,
        }
    }
}

/// Output handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Remove local output artifacts once the run has completed.
    pub delete_on_completion: bool,
    /// Push the transcoded audio to the configured S3 bucket.
    pub transfer_on_completion: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            delete_on_completion: true,
            transfer_on_completion: true,
        }
    }
}

/// S3 connection settings. All empty means no remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub endpoint_url: String,
    pub bucket: String,
    /// Key prefix under which outputs are stored.
    pub folder_in_bucket: String,
    pub region: String,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            bucket: String::new(),
            folder_in_bucket: String::new(),
            region: "us-east-1".to_string(),
        }
    }
}

impl S3Settings {
    /// Whether any of the connection settings has been supplied.
    pub fn is_configured(&self) -> bool {
        !self.endpoint_url.is_empty() || !self.bucket.is_empty() || !self.folder_in_bucket.is_empty()
    }
}

/// Audio extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioExtractionSettings {
    /// Output sample rate in Hz; 0 keeps the source rate.
    pub samplerate_hz: i64,
    /// Output container (wav or mp3).
    pub file_extension: String,
    pub convert_to_mono: bool,
}

impl Default for AudioExtractionSettings {
    fn default() -> Self {
        Self {
            samplerate_hz: 0,
            file_extension: "wav".to_string(),
            convert_to_mono: true,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file, then apply the
    /// process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AudexError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("audex")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data base directory.
    pub fn data_base_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_base_dir)
    }

    /// Override settings from environment variables.
    ///
    /// `lookup` returns the raw value of a variable, if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATA_BASE_DIR") {
            self.general.data_base_dir = v;
        }
        if let Some(v) = lookup("INPUT_URI") {
            self.input.uri = v;
        }
        if let Some(v) = lookup("S3_ENDPOINT_URL") {
            self.s3.endpoint_url = v;
        }
        if let Some(v) = lookup("S3_BUCKET") {
            self.s3.bucket = v;
        }
        if let Some(v) = lookup("S3_FOLDER_IN_BUCKET") {
            self.s3.folder_in_bucket = v;
        }
        if let Some(v) = lookup("S3_REGION") {
            self.s3.region = v;
        }
        if let Some(v) = lookup("AE_SAMPLERATE_HZ") {
            self.audio_extraction.samplerate_hz = parse_int("AE_SAMPLERATE_HZ", &v)?;
        }
        if let Some(v) = lookup("AE_FILE_EXTENSION") {
            self.audio_extraction.file_extension = v;
        }
        if let Some(v) = lookup("AE_CONVERT_TO_MONO") {
            self.audio_extraction.convert_to_mono = parse_flag("AE_CONVERT_TO_MONO", &v)?;
        }
        if let Some(v) = lookup("INPUT_DELETE_ON_COMPLETION") {
            self.input.delete_on_completion = parse_flag("INPUT_DELETE_ON_COMPLETION", &v)?;
        }
        if let Some(v) = lookup("OUTPUT_DELETE_ON_COMPLETION") {
            self.output.delete_on_completion = parse_flag("OUTPUT_DELETE_ON_COMPLETION", &v)?;
        }
        if let Some(v) = lookup("OUTPUT_TRANSFER_ON_COMPLETION") {
            self.output.transfer_on_completion =
                parse_flag("OUTPUT_TRANSFER_ON_COMPLETION", &v)?;
        }
        Ok(())
    }

    /// Validate the settings before any work is started.
    pub fn validate(&self) -> Result<()> {
        let base = &self.general.data_base_dir;
        if base.is_empty() {
            return Err(AudexError::Config(
                "Please add DATA_BASE_DIR to your environment".to_string(),
            ));
        }
        let base_dir = self.data_base_dir();
        if !base_dir.is_absolute() || base_dir == Path::new("/") {
            return Err(AudexError::Config(
                "Please enter an absolute, non-root path for DATA_BASE_DIR".to_string(),
            ));
        }
        if !base_dir.exists() {
            return Err(AudexError::Config(format!(
                "DATA_BASE_DIR does not exist: {}",
                base_dir.display()
            )));
        }

        if !self.input.uri.is_empty() && !is_valid_input_uri(&self.input.uri) {
            return Err(AudexError::Config(format!(
                "Please provide a valid INPUT_URI, not |{}|",
                self.input.uri
            )));
        }

        if self.s3.is_configured() {
            if self.s3.bucket.is_empty() {
                return Err(AudexError::Config("Please enter the S3_BUCKET to use".to_string()));
            }
            if !is_http_url(&self.s3.endpoint_url) {
                return Err(AudexError::Config(
                    "Please enter a valid S3_ENDPOINT_URL".to_string(),
                ));
            }
            if self.s3.folder_in_bucket.is_empty() {
                return Err(AudexError::Config(
                    "Please enter a path within the supplied S3 bucket".to_string(),
                ));
            }
        }

        if self.audio_extraction.samplerate_hz < 0 {
            return Err(AudexError::Config(
                "The AE_SAMPLERATE_HZ must be positive".to_string(),
            ));
        }
        self.audio_extraction
            .file_extension
            .parse::<OutputExtension>()
            .map_err(AudexError::Config)?;

        Ok(())
    }

    /// Build the immutable configuration snapshot handed to every stage.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let output_extension = self
            .audio_extraction
            .file_extension
            .parse::<OutputExtension>()
            .map_err(AudexError::Config)?;

        let remote_store = if self.s3.is_configured() {
            Some(RemoteStore {
                endpoint: self.s3.endpoint_url.clone(),
                bucket: self.s3.bucket.clone(),
                prefix: self.s3.folder_in_bucket.trim_matches('/').to_string(),
                region: self.s3.region.clone(),
            })
        } else {
            None
        };

        Ok(PipelineConfig {
            convert_to_mono: self.audio_extraction.convert_to_mono,
            output_sample_rate_hz: u32::try_from(self.audio_extraction.samplerate_hz).map_err(
                |_| AudexError::Config("The AE_SAMPLERATE_HZ is out of range".to_string()),
            )?,
            output_extension,
            delete_input_on_completion: self.input.delete_on_completion,
            delete_output_on_completion: self.output.delete_on_completion,
            transfer_output_on_completion: self.output.transfer_on_completion,
            remote_store,
        })
    }
}

fn parse_flag(param: &str, value: &str) -> Result<bool> {
    match value {
        "y" => Ok(true),
        "n" => Ok(false),
        other => Err(AudexError::Config(format!(
            "Please use y or n for {}, not |{}|",
            param, other
        ))),
    }
}

fn parse_int(param: &str, value: &str) -> Result<i64> {
    value.trim().parse::<i64>().map_err(|_| {
        AudexError::Config(format!(
            "Please enter a valid number for {}, not |{}|",
            param, value
        ))
    })
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn is_valid_input_uri(value: &str) -> bool {
    value.starts_with("s3://") || is_http_url(value) || Path::new(value).is_absolute()
}
