//! Init command - first-run setup of the data directories and config file.

use crate::cli::Output;
use crate::config::Settings;
use crate::storage::DataLayout;
use console::style;
use std::path::PathBuf;
use std::process::Command;

/// Run the init command.
pub fn run_init(settings: &Settings, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("Audex Setup");
    println!();

    // Step 1: media tool
    println!("{}", style("Step 1: Checking prerequisites").bold().cyan());
    if Command::new("ffmpeg").arg("-version").output().is_ok() {
        Output::success("ffmpeg is installed");
    } else {
        Output::warning("ffmpeg not found");
        println!("    {} {}", style("→").dim(), style(install_hint()).dim());
    }
    println!();

    // Step 2: data directories
    println!("{}", style("Step 2: Setting up directories").bold().cyan());
    let layout = DataLayout::new(settings.data_base_dir());
    let existed = layout.validate_data_dirs();
    layout.create_data_dirs()?;
    if existed {
        Output::info(&format!("Data directories exist under {}", layout.base_dir().display()));
    } else {
        Output::success(&format!("Created {}", layout.input_dir().display()));
        Output::success(&format!("Created {}", layout.output_root().display()));
    }
    println!();

    // Step 3: config file
    println!("{}", style("Step 3: Configuration file").bold().cyan());
    let config_path = config_path
        .cloned()
        .unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else {
        settings.save_to(&config_path)?;
        Output::success(&format!("Created config file: {}", config_path.display()));
    }
    println!();

    println!("{}", style("Setup Complete!").bold().green());
    println!();
    println!("Next steps:");
    println!("  {} Check system status", style("audex doctor").cyan());
    println!("  {} Extract audio from a video", style("audex run <input>").cyan());

    Ok(())
}

/// Platform-specific install hint for ffmpeg.
pub(crate) fn install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}
