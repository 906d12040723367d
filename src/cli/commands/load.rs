//! Load command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::PathBuf;

/// Run the load command.
pub async fn run_load(path: &str, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Load) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let path = PathBuf::from(shellexpand::tilde(path).to_string());

    if clear {
        orchestrator.search().clear().await?;
        Output::info("Cleared existing courses.");
    }

    let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
    let result = orchestrator.load_courses(&path).await;
    spinner.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            Output::error(&format!("Failed to load courses: {}", e));
            return Err(e.into());
        }
    };

    for title in &summary.skipped {
        Output::warning(&format!("Skipped '{}' (already loaded)", title));
    }

    Output::success(&format!(
        "Added {} courses with {} chunks",
        summary.courses_added, summary.chunks_added
    ));

    Ok(())
}
