//! Run command - process one input through the pipeline.

use crate::cli::{format_elapsed, preflight, Output};
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, PipelineRun};
use anyhow::Result;
use tracing::info;

/// Run the pipeline for `input` (or the configured INPUT_URI).
///
/// Prints the callback response as JSON on stdout and returns whether the run
/// succeeded.
pub async fn run_pipeline(
    input: Option<String>,
    print_provenance: bool,
    settings: Settings,
) -> Result<bool> {
    preflight::check(&settings)?;

    let input = input.unwrap_or_else(|| settings.input.uri.clone());
    let orchestrator = Orchestrator::new(&settings)?;
    info!("Running with {}", orchestrator.config().snapshot());

    let spinner = Output::spinner(&format!("Processing {}", display_input(&input)));
    let run = orchestrator.run(&input).await;
    spinner.finish_and_clear();

    report(&run);
    println!("{}", serde_json::to_string(&run.response)?);

    if print_provenance {
        if let Some(chain) = &run.provenance {
            println!("{}", serde_json::to_string_pretty(chain)?);
        }
    }

    Ok(run.response.is_success())
}

fn display_input(input: &str) -> &str {
    if input.is_empty() {
        "<no input>"
    } else {
        input
    }
}

fn report(run: &PipelineRun) {
    let elapsed = run
        .provenance
        .as_ref()
        .map(|chain| format_elapsed(chain.processing_time_ms));

    if run.response.is_success() {
        match elapsed {
            Some(elapsed) => Output::success(&format!("{} ({})", run.response.message, elapsed)),
            None => Output::success(&run.response.message),
        }
    } else {
        let stage = run
            .failed_in
            .map(|state| format!("{:?}", state))
            .unwrap_or_default();
        Output::error(&format!(
            "[{}] {} ({})",
            run.response.state, run.response.message, stage
        ));
    }
}
