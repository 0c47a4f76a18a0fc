//! Audex CLI entry point.

use anyhow::Result;
use audex::cli::{commands, Cli, Commands};
use audex::config::Settings;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("audex={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config_path = cli.config.as_ref().map(std::path::PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    match &cli.command {
        Commands::Run {
            input,
            print_provenance,
        } => {
            let ok = commands::run_pipeline(input.clone(), *print_provenance, settings).await?;
            if !ok {
                std::process::exit(1);
            }
        }

        Commands::Init => {
            commands::run_init(&settings, config_path.as_ref())?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path.as_ref())?;
        }
    }

    Ok(())
}
