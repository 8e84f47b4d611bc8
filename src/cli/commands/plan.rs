//! Plan command implementation.

use crate::chapters::{save_plan, ChapterMarker, ChapterPlanner};
use crate::chunking::TextChunk;
use crate::cli::Output;
use crate::config::Settings;
use crate::dispatch::{ChunkDispatcher, DispatchConfig};
use crate::manifest::ManifestStore;
use crate::run::RunLayout;
use crate::transform::{OpenAiTransformer, TransformMode};
use anyhow::Result;
use std::sync::Arc;

/// Run the plan command.
pub async fn run_plan(
    run_id: &str,
    markers: Option<String>,
    duration: Option<f64>,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    let layout = RunLayout::new(settings.work_dir(), run_id)?;
    let mut store = ManifestStore::open(layout.manifest_path())?;
    let planner = ChapterPlanner::new(store.manifest().total)?;

    let plan = match markers {
        Some(markers_path) => {
            let duration = duration
                .ok_or_else(|| anyhow::anyhow!("--markers requires --duration <seconds>"))?;
            if duration <= 0.0 {
                anyhow::bail!("--duration must be positive");
            }

            let content = std::fs::read_to_string(&markers_path)?;
            let markers: Vec<ChapterMarker> = serde_json::from_str(&content)?;
            Output::info(&format!("Mapping {} chapter markers onto chunks", markers.len()));

            let chunks = load_chunks(&layout)?;
            let total_chars = chunks.last().map(|c| c.end_char).unwrap_or(0);
            let chars_per_second = total_chars as f64 / duration;

            planner.from_markers(&markers, &chunks, chars_per_second)
        }
        None => {
            if !crate::openai::is_api_key_configured() {
                anyhow::bail!("OPENAI_API_KEY is not set; summary-based planning requires API access");
            }

            let model = model.unwrap_or_else(|| settings.dispatch.model.clone());
            let transformer = Arc::new(OpenAiTransformer::new(&model));
            let dispatcher = ChunkDispatcher::new(
                transformer.clone(),
                DispatchConfig {
                    max_attempts: settings.dispatch.max_attempts,
                },
            );

            Output::info("Summarizing chunks for planning...");
            let report = dispatcher
                .dispatch_pending(&mut store, &layout, TransformMode::Summarize)
                .await?;
            if !report.failed_indices.is_empty() {
                anyhow::bail!(
                    "Chunks {:?} failed to summarize; re-run plan after fixing",
                    report.failed_indices
                );
            }

            let summaries = dispatcher.collect_summaries(&store, &layout)?;
            let spinner = Output::spinner("Deriving chapter plan...");
            let plan = planner.from_summaries(transformer.as_ref(), &summaries).await?;
            spinner.finish_and_clear();
            plan
        }
    };

    save_plan(&layout.chapter_plan_path(), &plan)?;

    Output::success(&format!("Chapter plan with {} chapters saved", plan.len()));
    for entry in &plan {
        let title = match &entry.title_secondary {
            Some(secondary) => format!("{} / {}", entry.title_primary, secondary),
            None => entry.title_primary.clone(),
        };
        Output::list_item(&format!("chunk {:>3}  {}", entry.start_chunk_index, title));
    }

    Ok(())
}

/// Rebuild chunk records from the run directory's files and metadata.
fn load_chunks(layout: &RunLayout) -> Result<Vec<TextChunk>> {
    let meta = layout.load_chunk_meta()?;
    let mut chunks = Vec::with_capacity(meta.len());
    for m in meta {
        chunks.push(TextChunk {
            index: m.index,
            start_char: m.start_char,
            end_char: m.end_char,
            overlap_with_prev: m.overlap_with_prev,
            text: layout.read_chunk(m.index)?,
        });
    }
    Ok(chunks)
}
