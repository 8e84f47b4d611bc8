//! Chunk command implementation.

use crate::chunking::{ChunkerConfig, TextChunker};
use crate::cli::Output;
use crate::config::Settings;
use crate::manifest::ManifestStore;
use crate::run::RunLayout;
use anyhow::Result;
use std::path::Path;

/// Run the chunk command.
pub fn run_chunk(input: &str, run_id: Option<String>, settings: Settings) -> Result<()> {
    let path = Path::new(input);
    if !path.exists() {
        anyhow::bail!("Transcript file not found: {}", input);
    }

    let run_id = run_id.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("run")
            .to_string()
    });

    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        anyhow::bail!("Transcript file is empty: {}", input);
    }

    let chunker = TextChunker::new(ChunkerConfig {
        chunk_size: settings.chunking.chunk_size,
        overlap: settings.chunking.overlap,
    })?;
    let chunks = chunker.chunk(&text);

    let layout = RunLayout::new(settings.work_dir(), &run_id)?;
    layout.write_chunk_files(&chunks)?;
    let store = ManifestStore::load_or_create(layout.manifest_path(), chunks.len())?;

    Output::success(&format!(
        "Chunked {} chars into {} chunks",
        text.chars().count(),
        chunks.len()
    ));
    Output::kv("Run ID", layout.run_id());
    Output::kv("Run directory", &layout.run_dir().display().to_string());
    let (processed, failed, pending) = store.manifest().status_counts();
    Output::kv(
        "Manifest",
        &format!("{} processed, {} failed, {} pending", processed, failed, pending),
    );
    Output::info(&format!(
        "Next: skriv dispatch {} --mode structure",
        layout.run_id()
    ));

    Ok(())
}
