//! External media tool invocation.

use crate::error::{AudexError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Captured output of a finished tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// An external command-line media tool.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Program name, used for logging.
    fn program(&self) -> &str;

    /// Run the tool to completion. A non-zero exit is an error.
    async fn run(&self, args: &[String]) -> Result<ToolOutput>;
}

/// ffmpeg, spawned as a child process.
pub struct FfmpegTool {
    program: String,
}

impl FfmpegTool {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific binary (e.g. an absolute path).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[String]) -> Result<ToolOutput> {
        info!("Executing command: {} {}", self.program, args.join(" "));

        // No timeout: the run blocks until the tool exits.
        let result = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AudexError::ToolNotFound(self.program.clone()));
            }
            Err(e) => {
                return Err(AudexError::ToolFailed(format!(
                    "{} execution failed: {e}",
                    self.program
                )));
            }
        };

        let captured = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!("{} stdout: {}", self.program, captured.stdout.trim());
        info!("Process is done: {}", output.status);

        if !output.status.success() {
            return Err(AudexError::ToolFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                last_lines(&captured.stderr, 5)
            )));
        }

        debug!("{} stderr: {}", self.program, captured.stderr.trim());
        Ok(captured)
    }
}

/// The last `n` non-empty lines of `text`, joined by newlines.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
