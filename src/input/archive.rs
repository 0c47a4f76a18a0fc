//! Packaged `.tar.gz` assets.

use super::TRANSCODABLE_EXTENSIONS;
use crate::error::{AudexError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Archive member carrying the asset's identifier.
const METADATA_MEMBER: &str = "metadata.json";

fn open(archive: &Path) -> Result<tar::Archive<GzDecoder<File>>> {
    let file = File::open(archive)?;
    Ok(tar::Archive::new(GzDecoder::new(file)))
}

/// Read `source_id` from the archive's `metadata.json`, if present.
pub fn embedded_source_id(archive: &Path) -> Result<Option<String>> {
    let mut tarball = open(archive)?;
    for entry in tarball.entries()? {
        let mut entry = entry?;
        let is_metadata = entry
            .path()?
            .file_name()
            .is_some_and(|name| name == METADATA_MEMBER);
        if !is_metadata {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        let metadata: serde_json::Value = serde_json::from_str(&content)?;
        let source_id = metadata["source_id"]
            .as_str()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        debug!("Archive metadata source_id: {:?}", source_id);
        return Ok(source_id);
    }
    Ok(None)
}

/// Unpack the archive into `destination`.
pub fn extract(archive: &Path, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination)?;
    open(archive)?
        .unpack(destination)
        .map_err(|e| AudexError::Archive(format!("Failed to extract {}: {}", archive.display(), e)))?;
    info!("Extracted {} into {}", archive.display(), destination.display());
    Ok(())
}

/// Find the first transcodable media file below `dir`, in name order.
pub fn find_media_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in &entries {
        if path.is_file() && is_media_file(path) {
            return Ok(Some(path.clone()));
        }
    }
    for path in &entries {
        if path.is_dir() {
            if let Some(found) = find_media_file(path)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TRANSCODABLE_EXTENSIONS.contains(&format!(".{}", ext.to_lowercase()).as_str()))
        .unwrap_or(false)
}
