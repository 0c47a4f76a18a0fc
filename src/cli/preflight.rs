//! Pre-flight checks before a run.
//!
//! Validates the settings and that the media tool is available before an
//! input is downloaded.

use crate::config::Settings;
use crate::error::{AudexError, Result};
use std::process::Command;

/// Run pre-flight checks for a pipeline run.
pub fn check(settings: &Settings) -> Result<()> {
    settings.validate()?;
    check_tool("ffmpeg")
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(AudexError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AudexError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(AudexError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let err = check_tool("audex-no-such-tool").unwrap_err();
        assert!(matches!(err, AudexError::ToolNotFound(_)));
    }

    #[test]
    fn test_invalid_settings_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.data_base_dir = dir.path().join("missing").to_string_lossy().to_string();

        let err = check(&settings).unwrap_err();
        assert!(matches!(err, AudexError::Config(_)));
    }
}
