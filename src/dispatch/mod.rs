//! Sequential chunk dispatch over pending manifest entries.
//!
//! Drives each chunk through the external transformation exactly once per
//! attempt, strictly in ascending index order with one chunk fully committed
//! to the manifest before the next begins. There is deliberately no
//! concurrent dispatch: downstream chapter and overlap logic assumes strict
//! ordering, and the external collaborator processes one call at a time.

use crate::error::{Result, SkrivError};
use crate::manifest::{ChunkStatus, ManifestStore};
use crate::run::RunLayout;
use crate::transform::{TransformMode, Transformer};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for dispatch cycles.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Attempts after which a failed chunk is terminal for this run.
    pub max_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Outcome of one dispatch cycle.
#[derive(Debug)]
pub struct DispatchReport {
    /// Entries processed (or summarized) during this cycle.
    pub completed: usize,
    /// Entries that failed during this cycle.
    pub failed: usize,
    /// Manifest-wide counts after the cycle: (processed, failed, pending).
    pub counts: (usize, usize, usize),
    /// Indices that failed during this cycle.
    pub failed_indices: Vec<usize>,
    /// Failed indices that have exhausted their attempt budget.
    pub terminal_indices: Vec<usize>,
    /// Non-fatal output validation warnings.
    pub warnings: Vec<String>,
}

/// Dispatches pending chunks through the external transformation.
pub struct ChunkDispatcher {
    transformer: Arc<dyn Transformer>,
    config: DispatchConfig,
}

impl ChunkDispatcher {
    pub fn new(transformer: Arc<dyn Transformer>, config: DispatchConfig) -> Self {
        Self {
            transformer,
            config,
        }
    }

    /// Run one dispatch cycle over entries awaiting `mode`.
    ///
    /// Summarize targets Pending entries and advances them to Summarized;
    /// Structure/Translate target everything not yet Processed. Failed
    /// entries are skipped — retrying them is an explicit caller decision
    /// (`ManifestStore::reset_failed`), never an automatic one. A failing
    /// call marks the entry Failed and moves on; it does not abort the
    /// cycle.
    pub async fn dispatch_pending(
        &self,
        store: &mut ManifestStore,
        layout: &RunLayout,
        mode: TransformMode,
    ) -> Result<DispatchReport> {
        let targets: Vec<usize> = store
            .manifest()
            .pending_entries()
            .iter()
            .filter(|e| match mode {
                TransformMode::Summarize => e.status == ChunkStatus::Pending,
                _ => e.status != ChunkStatus::Failed,
            })
            .map(|e| e.chunk_index)
            .collect();

        info!("Dispatching {} chunks in {} mode", targets.len(), mode);

        let pb = ProgressBar::new(targets.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} Dispatch  [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("█▓░"),
        );

        let mut completed = 0;
        let mut failed_indices = Vec::new();
        let mut warnings = Vec::new();

        for index in targets {
            let chunk_text = layout.read_chunk(index)?;

            match self.transformer.transform(mode, &chunk_text).await {
                Ok(output) => {
                    warnings.extend(validate_output(mode, index, &chunk_text, &output));

                    let (out_path, status) = match mode {
                        TransformMode::Summarize => {
                            (layout.summary_path(index), ChunkStatus::Summarized)
                        }
                        _ => (layout.processed_path(index), ChunkStatus::Processed),
                    };
                    std::fs::write(&out_path, &output)?;

                    let file_name = out_path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|s| s.to_string());
                    store.update(index, status, file_name)?;
                    completed += 1;
                }
                Err(e) => {
                    warn!("Chunk {} failed: {}", index, e);
                    // Abandon the in-flight output; only the failure is
                    // committed, so the chunk will be re-attempted.
                    store.update(index, ChunkStatus::Failed, None)?;
                    failed_indices.push(index);
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();

        let counts = store.manifest().status_counts();
        let terminal_indices = store.manifest().exhausted_entries(self.config.max_attempts);

        for warning in &warnings {
            warn!("{}", warning);
        }
        info!(
            "Dispatch cycle done: {} processed, {} failed, {} pending",
            counts.0, counts.1, counts.2
        );

        Ok(DispatchReport {
            completed,
            failed: failed_indices.len(),
            counts,
            failed_indices,
            terminal_indices,
            warnings,
        })
    }

    /// Collect the per-chunk summaries required for chapter planning.
    /// Errors if any chunk has not been summarized yet.
    pub fn collect_summaries(
        &self,
        store: &ManifestStore,
        layout: &RunLayout,
    ) -> Result<Vec<String>> {
        let mut summaries = Vec::with_capacity(store.manifest().total);
        for index in 0..store.manifest().total {
            let entry = store.manifest().get(index).ok_or_else(|| {
                SkrivError::Manifest(format!("missing entry for chunk {}", index))
            })?;
            if entry.status == ChunkStatus::Pending || entry.status == ChunkStatus::Failed {
                return Err(SkrivError::Planning(format!(
                    "chunk {} has no summary yet (status: {})",
                    index, entry.status
                )));
            }
            summaries.push(layout.read_summary(index)?);
        }
        Ok(summaries)
    }
}

/// Structural checks on a transformation output. Warnings only; a suspect
/// output is still recorded and the caller decides what to do.
fn validate_output(mode: TransformMode, index: usize, input: &str, output: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    if mode == TransformMode::Summarize {
        return warnings;
    }

    let input_chars = input.chars().count();
    let output_chars = output.chars().count();
    let ratio = if input_chars > 0 {
        output_chars as f64 / input_chars as f64
    } else {
        0.0
    };

    if ratio < 0.5 {
        warnings.push(format!(
            "Chunk {}: output is only {:.0}% of input size ({} vs {} chars), \
             possible summarization instead of structuring",
            index,
            ratio * 100.0,
            output_chars,
            input_chars
        ));
    }

    if mode == TransformMode::Structure && input_chars > 2000 && !output.contains("##") {
        warnings.push(format!(
            "Chunk {}: no section headers (##) found in output, structuring may have failed",
            index
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunk;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Transformer that prefixes output per mode and fails on demand.
    ///
    /// Any chunk whose text contains "BOOM" fails; everything else succeeds.
    struct ScriptedTransformer {
        calls: AtomicUsize,
    }

    impl ScriptedTransformer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transformer for ScriptedTransformer {
        async fn transform(&self, mode: TransformMode, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("BOOM") {
                return Err(SkrivError::Transform("scripted failure".into()));
            }
            Ok(match mode {
                TransformMode::Summarize => format!("summary of: {}", &text[..text.len().min(10)]),
                _ => format!("## Section\n\n{}", text),
            })
        }

        async fn plan_chapters(&self, _: &[String]) -> Result<String> {
            Ok("[]".to_string())
        }
    }

    fn setup(texts: &[&str]) -> (tempfile::TempDir, RunLayout, ManifestStore) {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "test-run").unwrap();
        let chunks: Vec<TextChunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextChunk {
                index: i,
                start_char: 0,
                end_char: t.len(),
                overlap_with_prev: 0,
                text: t.to_string(),
            })
            .collect();
        layout.write_chunk_files(&chunks).unwrap();
        let store = ManifestStore::load_or_create(layout.manifest_path(), chunks.len()).unwrap();
        (dir, layout, store)
    }

    fn dispatcher(t: Arc<ScriptedTransformer>) -> ChunkDispatcher {
        ChunkDispatcher::new(t, DispatchConfig { max_attempts: 3 })
    }

    #[tokio::test]
    async fn test_dispatch_processes_all_pending_in_order() {
        let (_dir, layout, mut store) = setup(&["alpha", "beta", "gamma"]);
        let t = ScriptedTransformer::new();

        let report = dispatcher(t.clone())
            .dispatch_pending(&mut store, &layout, TransformMode::Structure)
            .await
            .unwrap();

        assert_eq!(report.completed, 3);
        assert_eq!(report.failed, 0);
        assert!(store.manifest().is_complete());
        assert_eq!(layout.read_processed(1).unwrap(), "## Section\n\nbeta");
        assert_eq!(
            store.manifest().get(0).unwrap().output_path.as_deref(),
            Some("processed_000.md")
        );
    }

    #[tokio::test]
    async fn test_resumed_dispatch_leaves_processed_entries_untouched() {
        let (_dir, layout, mut store) = setup(&["alpha", "beta"]);
        let t = ScriptedTransformer::new();
        let d = dispatcher(t.clone());

        d.dispatch_pending(&mut store, &layout, TransformMode::Structure)
            .await
            .unwrap();
        let before = store.manifest().get(0).unwrap().clone();
        let calls_before = t.calls.load(Ordering::SeqCst);

        // Second cycle: nothing pending, nothing called, nothing mutated.
        let report = d
            .dispatch_pending(&mut store, &layout, TransformMode::Structure)
            .await
            .unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(t.calls.load(Ordering::SeqCst), calls_before);
        let after = store.manifest().get(0).unwrap();
        assert_eq!(after.attempt_count, before.attempt_count);
        assert_eq!(after.output_path, before.output_path);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_not_auto_retried() {
        let (_dir, layout, mut store) = setup(&["fine", "BOOM here", "also fine"]);
        let t = ScriptedTransformer::new();
        let d = dispatcher(t.clone());

        let report = d
            .dispatch_pending(&mut store, &layout, TransformMode::Structure)
            .await
            .unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed_indices, vec![1]);
        assert_eq!(store.manifest().get(1).unwrap().status, ChunkStatus::Failed);
        assert!(!store.manifest().is_complete());

        // Re-dispatch skips the failed entry until an explicit reset.
        let report = d
            .dispatch_pending(&mut store, &layout, TransformMode::Structure)
            .await
            .unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(store.manifest().get(1).unwrap().attempt_count, 1);

        store.reset_failed().unwrap();
        let report = d
            .dispatch_pending(&mut store, &layout, TransformMode::Structure)
            .await
            .unwrap();
        // Still fails (text still contains BOOM), but it was re-attempted.
        assert_eq!(report.failed, 1);
        assert_eq!(store.manifest().get(1).unwrap().attempt_count, 2);
    }

    #[tokio::test]
    async fn test_summarize_then_structure_lifecycle() {
        let (_dir, layout, mut store) = setup(&["one", "two"]);
        let t = ScriptedTransformer::new();
        let d = dispatcher(t.clone());

        d.dispatch_pending(&mut store, &layout, TransformMode::Summarize)
            .await
            .unwrap();
        assert!(store
            .manifest()
            .entries
            .iter()
            .all(|e| e.status == ChunkStatus::Summarized));
        assert!(layout.read_summary(0).unwrap().starts_with("summary of:"));

        // Summarize again: nothing left in Pending, no calls made.
        let calls = t.calls.load(Ordering::SeqCst);
        d.dispatch_pending(&mut store, &layout, TransformMode::Summarize)
            .await
            .unwrap();
        assert_eq!(t.calls.load(Ordering::SeqCst), calls);

        // Summaries feed chapter planning.
        let summaries = d.collect_summaries(&store, &layout).unwrap();
        assert_eq!(summaries.len(), 2);

        // Main pass advances Summarized entries to Processed.
        d.dispatch_pending(&mut store, &layout, TransformMode::Structure)
            .await
            .unwrap();
        assert!(store.manifest().is_complete());
    }

    #[tokio::test]
    async fn test_collect_summaries_requires_all_summarized() {
        let (_dir, layout, mut store) = setup(&["one", "two"]);
        let t = ScriptedTransformer::new();
        let d = dispatcher(t.clone());
        store.update(0, ChunkStatus::Summarized, None).unwrap();
        std::fs::write(layout.summary_path(0), "s0").unwrap();

        assert!(matches!(
            d.collect_summaries(&store, &layout),
            Err(SkrivError::Planning(_))
        ));
    }

    #[test]
    fn test_validate_output_flags_shrunken_structure_output() {
        let input = "x".repeat(3000);
        let warnings = validate_output(TransformMode::Structure, 4, &input, "tiny");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("Chunk 4"));
        assert!(warnings[1].contains("##"));
    }

    #[test]
    fn test_validate_output_accepts_reasonable_output() {
        let input = "y".repeat(3000);
        let output = format!("## Header\n\n{}", "y".repeat(2800));
        assert!(validate_output(TransformMode::Structure, 0, &input, &output).is_empty());
    }

    #[test]
    fn test_validate_output_skips_summaries() {
        let input = "z".repeat(3000);
        assert!(validate_output(TransformMode::Summarize, 0, &input, "short").is_empty());
    }
}
