//! Asset identification from input paths.

use super::archive;
use std::path::Path;
use tracing::{info, warn};

/// Archive suffix recognized as a packaged asset.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Whether the input refers to a packaged archive.
pub fn is_archive(input: &str) -> bool {
    input.contains(ARCHIVE_SUFFIX)
}

/// Split a path into `(base name without extension, extension with leading dot)`.
///
/// The extension is empty when the name has none.
pub fn get_asset_info(input: &str) -> (String, String) {
    let path = Path::new(input);
    let asset_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    info!("working with this asset ID {}", asset_id);
    (asset_id, extension)
}

/// Name of the directory that contains `input`, or of `input` itself when it
/// is a directory path with a trailing slash.
pub fn source_id_from_parent(input: &str) -> String {
    let trimmed = input.trim_end_matches('/');
    let segment = if trimmed.len() < input.len() {
        Path::new(trimmed).file_name()
    } else {
        Path::new(trimmed).parent().and_then(|p| p.file_name())
    };
    segment
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Derive `(source_id, extension)` for an input.
///
/// Archives take their ID from embedded metadata, falling back to the parent
/// directory name. Everything else uses the file name without extension. Never
/// fails: an empty source ID means the input could not be identified.
pub fn locate(input: &str) -> (String, String) {
    if !is_archive(input) {
        return get_asset_info(input);
    }

    let source_id = match archive::embedded_source_id(Path::new(input)) {
        Ok(Some(id)) => id,
        Ok(None) => source_id_from_parent(input),
        Err(e) => {
            warn!("Could not read archive metadata from {}: {}", input, e);
            source_id_from_parent(input)
        }
    };
    (source_id, ARCHIVE_SUFFIX.to_string())
}

/// Mime type for a file extension (with leading dot).
pub fn extension_to_mime_type(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        ".mov" => "video/quicktime",
        ".mp4" => "video/mp4",
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_asset_info() {
        assert_eq!(
            get_asset_info("s3://bucket/in/program123__carrier456.mp4"),
            ("program123__carrier456".to_string(), ".mp4".to_string())
        );
        assert_eq!(
            get_asset_info("/data/input/clip.mov"),
            ("clip".to_string(), ".mov".to_string())
        );
        assert_eq!(get_asset_info("/data/input/noext"), ("noext".to_string(), String::new()));
        assert_eq!(get_asset_info(""), (String::new(), String::new()));
    }

    #[test]
    fn test_source_id_from_parent() {
        assert_eq!(source_id_from_parent("/data/input/asset42/video.mp4"), "asset42");
        assert_eq!(source_id_from_parent("/data/input/asset42/"), "asset42");
        assert_eq!(source_id_from_parent("video.mp4"), "");
    }

    #[test]
    fn test_locate_archive_without_file_falls_back_to_parent() {
        let (source_id, extension) = locate("/data/input/asset42/missing.tar.gz");
        assert_eq!(source_id, "asset42");
        assert_eq!(extension, ".tar.gz");
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(extension_to_mime_type(".mov"), "video/quicktime");
        assert_eq!(extension_to_mime_type(".MP4"), "video/mp4");
        assert_eq!(extension_to_mime_type(".wav"), "audio/wav");
        assert_eq!(extension_to_mime_type(".txt"), "application/octet-stream");
    }
}
