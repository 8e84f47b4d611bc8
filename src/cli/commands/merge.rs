//! Merge command implementation.

use crate::chapters::{load_plan, ChapterPlanEntry};
use crate::cli::Output;
use crate::config::Settings;
use crate::manifest::ManifestStore;
use crate::merge::{MergeConfig, Merger};
use crate::run::RunLayout;
use anyhow::Result;

/// Run the merge command.
pub fn run_merge(run_id: &str, archive: bool, settings: Settings) -> Result<()> {
    let layout = RunLayout::new(settings.work_dir(), run_id)?;
    let store = ManifestStore::open(layout.manifest_path())?;

    let plan_path = layout.chapter_plan_path();
    let plan = if plan_path.exists() {
        load_plan(&plan_path)?
    } else {
        Output::info("No chapter plan found, using a single chapter");
        vec![ChapterPlanEntry {
            title_primary: "Introduction".to_string(),
            title_secondary: None,
            start_chunk_index: 0,
        }]
    };

    let merger = Merger::new(MergeConfig {
        similarity_threshold: settings.merge.similarity_threshold,
    });
    let merged = merger.merge(&store, &layout, &plan)?;

    let merged_path = layout.merged_path();
    std::fs::write(&merged_path, &merged)?;

    Output::success(&format!(
        "Merged {} chunks into {}",
        store.manifest().total,
        merged_path.display()
    ));
    Output::kv("Chapters", &plan.len().to_string());
    Output::kv("Size", &format!("{} chars", merged.chars().count()));

    if archive {
        store.archive()?;
        Output::info("Manifest archived");
    }

    Ok(())
}
