//! Dispatch command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::dispatch::{ChunkDispatcher, DispatchConfig};
use crate::manifest::ManifestStore;
use crate::run::RunLayout;
use crate::transform::{OpenAiTransformer, TransformMode};
use anyhow::Result;
use std::sync::Arc;

/// Run the dispatch command.
pub async fn run_dispatch(
    run_id: &str,
    mode: &str,
    retry_failed: bool,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    let mode: TransformMode = mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    if !crate::openai::is_api_key_configured() {
        anyhow::bail!("OPENAI_API_KEY is not set; dispatch requires API access");
    }

    let layout = RunLayout::new(settings.work_dir(), run_id)?;
    let mut store = ManifestStore::open(layout.manifest_path())?;

    if retry_failed {
        let reset = store.reset_failed()?;
        if reset > 0 {
            Output::info(&format!("Reset {} failed chunks to pending", reset));
        }
    }

    let model = model.unwrap_or_else(|| settings.dispatch.model.clone());
    let transformer = Arc::new(OpenAiTransformer::new(&model));
    let dispatcher = ChunkDispatcher::new(
        transformer,
        DispatchConfig {
            max_attempts: settings.dispatch.max_attempts,
        },
    );

    Output::info(&format!("Dispatching run '{}' in {} mode ({})", run_id, mode, model));
    let report = dispatcher.dispatch_pending(&mut store, &layout, mode).await?;

    let (processed, failed, pending) = report.counts;
    Output::success(&format!(
        "Cycle done: {} completed, {} failed this cycle",
        report.completed, report.failed
    ));
    Output::kv(
        "Manifest",
        &format!("{} processed, {} failed, {} pending", processed, failed, pending),
    );

    for warning in &report.warnings {
        Output::warning(warning);
    }
    if !report.failed_indices.is_empty() {
        Output::warning(&format!(
            "Failed chunks: {:?} (re-run with --retry-failed to retry)",
            report.failed_indices
        ));
    }
    if !report.terminal_indices.is_empty() {
        Output::warning(&format!(
            "Chunks {:?} have exhausted {} attempts",
            report.terminal_indices, settings.dispatch.max_attempts
        ));
    }
    if store.manifest().is_complete() {
        Output::info(&format!("Next: skriv merge {}", run_id));
    }

    Ok(())
}
