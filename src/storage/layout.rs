//! Local data directory layout.
//!
//! ```text
//! {data_base_dir}/input/                                 downloaded or extracted inputs
//! {data_base_dir}/output/{source_id}/audio/{source_id}.{ext}
//! {data_base_dir}/output/{source_id}/provenance/{source_id}.json
//! ```

use crate::config::OutputExtension;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Kinds of output this worker produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Audio,
    Provenance,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Audio => "audio",
            OutputType::Provenance => "provenance",
        }
    }
}

/// Paths under the mounted data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    base_dir: PathBuf,
}

impl DataLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn input_dir(&self) -> PathBuf {
        self.base_dir.join("input")
    }

    pub fn output_root(&self) -> PathBuf {
        self.base_dir.join("output")
    }

    /// Scratch directory for a single asset's extracted input.
    pub fn asset_input_dir(&self, source_id: &str) -> PathBuf {
        self.input_dir().join(source_id)
    }

    /// Root of all outputs for one asset.
    pub fn base_output_dir(&self, source_id: &str) -> PathBuf {
        self.output_root().join(source_id)
    }

    pub fn output_type_dir(&self, source_id: &str, output_type: OutputType) -> PathBuf {
        self.base_output_dir(source_id).join(output_type.as_str())
    }

    /// Deterministic path of the transcoded audio.
    pub fn audio_file_path(&self, source_id: &str, extension: OutputExtension) -> PathBuf {
        self.output_type_dir(source_id, OutputType::Audio)
            .join(format!("{}.{}", source_id, extension))
    }

    /// Deterministic path of the provenance document.
    pub fn provenance_file_path(&self, source_id: &str) -> PathBuf {
        self.output_type_dir(source_id, OutputType::Provenance)
            .join(format!("{}.json", source_id))
    }

    /// Whether the base, input and output directories are in place.
    pub fn validate_data_dirs(&self) -> bool {
        let mut ok = true;
        for dir in [self.base_dir.clone(), self.input_dir(), self.output_root()] {
            if !dir.is_dir() {
                warn!("Required directory missing: {}", dir.display());
                ok = false;
            }
        }
        ok
    }

    /// Create the input and output roots.
    pub fn create_data_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.input_dir())?;
        std::fs::create_dir_all(self.output_root())
    }

    /// Create the per-asset output tree.
    pub fn generate_output_dirs(&self, source_id: &str) -> std::io::Result<()> {
        for output_type in [OutputType::Audio, OutputType::Provenance] {
            let dir = self.output_type_dir(source_id, output_type);
            if !dir.exists() {
                info!("{} does not exist, creating it now", dir.display());
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    /// Remove all local outputs of an asset.
    pub fn delete_local_output(&self, source_id: &str) -> bool {
        let output_dir = self.base_output_dir(source_id);
        info!("Deleting output folder: {}", output_dir.display());
        if !is_safe_source_id(source_id) {
            warn!("Refusing to delete {}", output_dir.display());
            return false;
        }
        match std::fs::remove_dir_all(&output_dir) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to delete {}: {}", output_dir.display(), e);
                false
            }
        }
    }

    /// Remove the input file (and the asset's extraction directory) when requested.
    pub fn delete_input_file(&self, input_path: &Path, source_id: &str, delete: bool) -> bool {
        if !delete {
            info!("Configured to leave the input alone");
            return true;
        }

        info!("Deleting input file: {}", input_path.display());
        if let Err(e) = std::fs::remove_file(input_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not delete {}: {}", input_path.display(), e);
                return false;
            }
            warn!("Input file {} was already gone", input_path.display());
        }

        let asset_dir = self.asset_input_dir(source_id);
        if is_safe_source_id(source_id) && asset_dir.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&asset_dir) {
                warn!("Could not delete {}: {}", asset_dir.display(), e);
                return false;
            }
        }
        true
    }
}

/// A source ID that names exactly one directory below its parent.
pub(crate) fn is_safe_source_id(source_id: &str) -> bool {
    !source_id.is_empty() && !source_id.contains(['/', '\\']) && source_id != "." && source_id != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths() {
        let layout = DataLayout::new("/data");
        assert_eq!(
            layout.audio_file_path("prog__car", OutputExtension::Mp3),
            PathBuf::from("/data/output/prog__car/audio/prog__car.mp3")
        );
        assert_eq!(
            layout.provenance_file_path("prog__car"),
            PathBuf::from("/data/output/prog__car/provenance/prog__car.json")
        );
    }

    #[test]
    fn test_validate_and_create_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        assert!(!layout.validate_data_dirs());

        layout.create_data_dirs().unwrap();
        assert!(layout.validate_data_dirs());
    }

    #[test]
    fn test_generate_and_delete_output() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        layout.generate_output_dirs("asset").unwrap();
        assert!(layout.output_type_dir("asset", OutputType::Audio).is_dir());
        assert!(layout.output_type_dir("asset", OutputType::Provenance).is_dir());

        assert!(layout.delete_local_output("asset"));
        assert!(!layout.base_output_dir("asset").exists());
        assert!(!layout.delete_local_output(""));
    }

    #[test]
    fn test_delete_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        layout.create_data_dirs().unwrap();
        let input = layout.input_dir().join("asset.mp4");
        std::fs::write(&input, b"video").unwrap();

        assert!(layout.delete_input_file(&input, "asset", false));
        assert!(input.exists());

        assert!(layout.delete_input_file(&input, "asset", true));
        assert!(!input.exists());
    }

    #[test]
    fn test_safe_source_ids() {
        assert!(is_safe_source_id("prog__car"));
        assert!(!is_safe_source_id(""));
        assert!(!is_safe_source_id(".."));
        assert!(!is_safe_source_id("../x"));
        assert!(!is_safe_source_id("a\\b"));
    }

    #[test]
    fn test_delete_input_file_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        // a directory cannot be removed with remove_file
        let input = dir.path().join("not_a_file.mp4");
        std::fs::create_dir_all(&input).unwrap();

        assert!(!layout.delete_input_file(&input, "asset", true));
    }
}
