//! Status command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::manifest::{ChunkStatus, ManifestStore};
use crate::run::RunLayout;
use anyhow::Result;

/// Run the status command.
pub fn run_status(run_id: &str, settings: Settings) -> Result<()> {
    let layout = RunLayout::new(settings.work_dir(), run_id)?;
    if !layout.manifest_path().exists() {
        anyhow::bail!(
            "No manifest for run '{}'; run 'skriv chunk' first",
            run_id
        );
    }
    let store = ManifestStore::open(layout.manifest_path())?;
    let manifest = store.manifest();

    Output::header(&format!("Run '{}'", layout.run_id()));
    Output::kv("Directory", &layout.run_dir().display().to_string());
    Output::kv("Total chunks", &manifest.total.to_string());
    Output::kv("Created", &manifest.created_at.to_rfc3339());

    let (processed, failed, pending) = manifest.status_counts();
    let summarized = manifest
        .entries
        .iter()
        .filter(|e| e.status == ChunkStatus::Summarized)
        .count();
    Output::kv("Processed", &processed.to_string());
    Output::kv("Summarized", &summarized.to_string());
    Output::kv("Pending", &pending.to_string());
    Output::kv("Failed", &failed.to_string());

    let failed_indices: Vec<usize> = manifest
        .entries
        .iter()
        .filter(|e| e.status == ChunkStatus::Failed)
        .map(|e| e.chunk_index)
        .collect();
    if !failed_indices.is_empty() {
        Output::list_item(&format!("failed chunks: {:?}", failed_indices));
    }
    let terminal = manifest.exhausted_entries(settings.dispatch.max_attempts);
    if !terminal.is_empty() {
        Output::warning(&format!(
            "Chunks {:?} have exhausted {} attempts",
            terminal, settings.dispatch.max_attempts
        ));
    }

    if manifest.is_complete() {
        Output::success("All chunks processed; ready to merge");
    }
    if layout.merged_path().exists() {
        Output::kv(
            "Merged document",
            &layout.merged_path().display().to_string(),
        );
    }
    if layout.chapter_plan_path().exists() {
        Output::kv("Chapter plan", "present");
    }

    Ok(())
}
