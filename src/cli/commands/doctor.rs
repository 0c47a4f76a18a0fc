//! Doctor command - verify system requirements and configuration.

use super::init::install_hint;
use crate::cli::Output;
use crate::config::Settings;
use crate::storage::{DataLayout, S3Store};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Audex Doctor");
    println!();

    let sections = [
        ("External Tools", vec![check_ffmpeg()]),
        ("Configuration", vec![check_settings(settings)]),
        ("Directories", check_directories(settings)),
        ("Object Storage", check_s3(settings)),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!("{} error(s) found. Please fix them before running audex.", errors));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Audex is ready to use.");
    }

    Ok(())
}

fn check_ffmpeg() -> CheckResult {
    match Command::new("ffmpeg").arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .chars()
                .take(50)
                .collect::<String>();
            CheckResult::ok("ffmpeg", &version)
        }
        Ok(_) => CheckResult::error("ffmpeg", "installed but not working", install_hint()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error("ffmpeg", "not found", install_hint())
        }
        Err(e) => CheckResult::error("ffmpeg", &format!("error: {}", e), install_hint()),
    }
}

fn check_settings(settings: &Settings) -> CheckResult {
    match settings.validate() {
        Ok(()) => CheckResult::ok("Settings", "valid"),
        Err(e) => CheckResult::error("Settings", &e.to_string(), "Check your config file and environment"),
    }
}

fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let layout = DataLayout::new(settings.data_base_dir());
    [
        ("Data directory", layout.base_dir().to_path_buf()),
        ("Input directory", layout.input_dir()),
        ("Output directory", layout.output_root()),
    ]
    .into_iter()
    .map(|(name, dir)| {
        if dir.is_dir() {
            CheckResult::ok(name, &dir.display().to_string())
        } else {
            CheckResult::error(
                name,
                &format!("{} (missing)", dir.display()),
                "Create with: audex init",
            )
        }
    })
    .collect()
}

fn check_s3(settings: &Settings) -> Vec<CheckResult> {
    if !settings.s3.is_configured() {
        let message = "not configured (local inputs only)";
        return if settings.output.transfer_on_completion {
            vec![CheckResult::warning(
                "S3",
                message,
                "Set OUTPUT_TRANSFER_ON_COMPLETION=n or configure S3_ENDPOINT_URL and S3_BUCKET",
            )]
        } else {
            vec![CheckResult::ok("S3", message)]
        };
    }

    let target = format!(
        "{} ({}/{})",
        settings.s3.endpoint_url, settings.s3.bucket, settings.s3.folder_in_bucket
    );
    match S3Store::new(&settings.s3.endpoint_url, &settings.s3.region) {
        Ok(store) if store.has_credentials() => vec![
            CheckResult::ok("S3 endpoint", &target),
            CheckResult::ok("S3 credentials", "found in environment"),
        ],
        Ok(_) => vec![
            CheckResult::ok("S3 endpoint", &target),
            CheckResult::error(
                "S3 credentials",
                "not set",
                "Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
            ),
        ],
        Err(e) => vec![CheckResult::error("S3 endpoint", &e.to_string(), "Check S3_ENDPOINT_URL")],
    }
}
