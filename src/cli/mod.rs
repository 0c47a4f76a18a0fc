//! CLI module for audex.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_elapsed, Output};

use clap::{Parser, Subcommand};

/// Audex - audio extraction worker
///
/// Extracts audio from video assets, records provenance and hands the result to S3.
#[derive(Parser, Debug)]
#[command(name = "audex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process one input: acquire, transcode, record provenance, finalize
    Run {
        /// S3 URI, local .tar.gz archive, or local file/directory (defaults to INPUT_URI)
        input: Option<String>,

        /// Print the provenance document after the run
        #[arg(long)]
        print_provenance: bool,
    },

    /// Create the data directories and a default configuration file
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file plus environment)
    Show,

    /// Show configuration file path
    Path,
}
