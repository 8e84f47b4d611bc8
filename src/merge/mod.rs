//! Overlap-deduplicating reassembly with chapter headers.
//!
//! Concatenates processed chunk outputs in index order, stripping the
//! duplicated overlap span from the head of each chunk and injecting
//! chapter headers at plan boundaries. Because the transformation may have
//! altered the overlap text, the match is fuzzy; when no confident match is
//! found the full chunk is kept, since retaining a duplicated sentence is
//! cheaper than dropping content.

use crate::chapters::ChapterPlanEntry;
use crate::error::{Result, SkrivError};
use crate::manifest::{ChunkStatus, ManifestStore};
use crate::run::RunLayout;
use similar::TextDiff;
use std::collections::HashMap;
use tracing::{debug, info};

/// Configuration for merge-time overlap matching.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Minimum similarity for an overlap match to be trusted.
    pub similarity_threshold: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

/// Reassembles processed chunks into one document.
pub struct Merger {
    config: MergeConfig,
}

impl Merger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Merge all processed outputs, or fail naming every missing chunk.
    ///
    /// A gap in the processed sequence is a hard error: silently skipping a
    /// chunk would corrupt the document without anyone noticing.
    pub fn merge(
        &self,
        store: &ManifestStore,
        layout: &RunLayout,
        plan: &[ChapterPlanEntry],
    ) -> Result<String> {
        let manifest = store.manifest();
        let missing: Vec<usize> = manifest
            .entries
            .iter()
            .filter(|e| e.status != ChunkStatus::Processed)
            .map(|e| e.chunk_index)
            .collect();
        if !missing.is_empty() {
            return Err(SkrivError::MergeGap(missing));
        }

        let meta = layout.load_chunk_meta()?;
        if meta.len() != manifest.total {
            return Err(SkrivError::Manifest(format!(
                "chunk metadata covers {} chunks, manifest has {}",
                meta.len(),
                manifest.total
            )));
        }

        let chapters: HashMap<usize, &ChapterPlanEntry> =
            plan.iter().map(|e| (e.start_chunk_index, e)).collect();

        let mut out = String::new();
        let mut prev_output: Option<String> = None;
        let mut chapters_inserted = 0;

        for index in 0..manifest.total {
            let content = layout.read_processed(index)?;

            if let Some(chapter) = chapters.get(&index) {
                out.push_str(&format!("## {}\n", chapter.title_primary));
                if let Some(secondary) = &chapter.title_secondary {
                    out.push_str(&format!("## {}\n", secondary));
                }
                out.push('\n');
                chapters_inserted += 1;
            }

            let body = match &prev_output {
                Some(prev) if meta[index].overlap_with_prev > 0 => strip_overlap(
                    prev,
                    &content,
                    meta[index].overlap_with_prev,
                    self.config.similarity_threshold,
                ),
                _ => content.clone(),
            };

            out.push_str(body.trim());
            out.push_str("\n\n");
            prev_output = Some(content);
        }

        info!(
            "Merged {} chunks with {} chapter headers",
            manifest.total, chapters_inserted
        );

        let mut merged = out.trim_end().to_string();
        merged.push('\n');
        Ok(merged)
    }
}

/// Strip the duplicated overlap from the head of `current`.
///
/// Tries prefix lengths around the original overlap size and compares each
/// against the equally long tail of the previous output; the best match
/// above the threshold wins. Returns `current` unchanged when nothing
/// matches confidently.
fn strip_overlap(prev: &str, current: &str, overlap_hint: usize, threshold: f64) -> String {
    let prev_chars: Vec<char> = prev.chars().collect();
    let cur_chars: Vec<char> = current.chars().collect();

    let min_len = (overlap_hint / 2).max(8);
    let max_len = (overlap_hint * 2).min(cur_chars.len()).min(prev_chars.len());
    if max_len < min_len {
        return current.to_string();
    }

    let mut best: Option<(usize, f64)> = None;
    for k in min_len..=max_len {
        let candidate: String = cur_chars[..k].iter().collect();
        let tail: String = prev_chars[prev_chars.len() - k..].iter().collect();
        let score = similarity(&candidate, &tail);
        if score >= threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((k, score));
        }
    }

    match best {
        Some((k, score)) => {
            debug!("Stripping {} overlap chars (similarity {:.2})", k, score);
            cur_chars[k..].iter().collect::<String>().trim_start().to_string()
        }
        None => {
            debug!("No confident overlap match, keeping full chunk");
            current.to_string()
        }
    }
}

/// Char-level similarity ratio in [0, 1].
fn similarity(a: &str, b: &str) -> f64 {
    f64::from(TextDiff::from_chars(a, b).ratio())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunk;
    use crate::run::RunLayout;
    use tempfile::tempdir;

    fn setup_processed(
        chunks: &[(&str, usize)],
        processed: &[Option<&str>],
    ) -> (tempfile::TempDir, RunLayout, ManifestStore) {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "merge-test").unwrap();

        let mut offset = 0;
        let text_chunks: Vec<TextChunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, &(text, overlap))| {
                let own_len = text.chars().count() - overlap;
                let chunk = TextChunk {
                    index: i,
                    start_char: offset,
                    end_char: offset + own_len,
                    overlap_with_prev: overlap,
                    text: text.to_string(),
                };
                offset += own_len;
                chunk
            })
            .collect();
        layout.write_chunk_files(&text_chunks).unwrap();

        let mut store =
            ManifestStore::load_or_create(layout.manifest_path(), chunks.len()).unwrap();
        for (i, output) in processed.iter().enumerate() {
            if let Some(text) = output {
                std::fs::write(layout.processed_path(i), text).unwrap();
                store
                    .update(i, ChunkStatus::Processed, Some(format!("processed_{:03}.md", i)))
                    .unwrap();
            }
        }
        (dir, layout, store)
    }

    fn single_chapter() -> Vec<ChapterPlanEntry> {
        vec![ChapterPlanEntry {
            title_primary: "Introduction".into(),
            title_secondary: None,
            start_chunk_index: 0,
        }]
    }

    #[test]
    fn test_merge_strips_exact_overlap() {
        // Chunk 1 repeats the tail of chunk 0 verbatim (16-char overlap).
        let tail = "shared overlap. ";
        let (_dir, layout, store) = setup_processed(
            &[
                (&format!("First part ends with {}", tail), 0),
                (&format!("{}Second part continues.", tail), 16),
            ],
            &[
                Some("First part ends with shared overlap. "),
                Some("shared overlap. Second part continues."),
            ],
        );

        let merged = Merger::new(MergeConfig::default())
            .merge(&store, &layout, &single_chapter())
            .unwrap();
        assert_eq!(merged.matches("shared overlap.").count(), 1);
        assert!(merged.contains("Second part continues."));
    }

    #[test]
    fn test_merge_strips_slightly_altered_overlap() {
        // Transformation changed one word inside the duplicated span.
        let (_dir, layout, store) = setup_processed(
            &[
                ("Alpha beta gamma delta epsilon. ", 0),
                ("gamma delta epsilon. Zeta eta theta.", 20),
            ],
            &[
                Some("Alpha beta gamma delta epsilon. "),
                Some("gamma delta epsilom. Zeta eta theta."),
            ],
        );

        let merged = Merger::new(MergeConfig::default())
            .merge(&store, &layout, &single_chapter())
            .unwrap();
        assert_eq!(merged.matches("Zeta eta theta.").count(), 1);
        assert_eq!(merged.matches("delta").count(), 1);
    }

    #[test]
    fn test_merge_keeps_full_chunk_without_confident_match() {
        let (_dir, layout, store) = setup_processed(
            &[
                ("Original ending text here. ", 0),
                ("overlap words overlap. Real content follows.", 20),
            ],
            &[
                Some("Completely rewritten ending."),
                Some("Unrecognizable new opening. Real content follows."),
            ],
        );

        let merged = Merger::new(MergeConfig::default())
            .merge(&store, &layout, &single_chapter())
            .unwrap();
        // Nothing stripped: both processed outputs fully present.
        assert!(merged.contains("Completely rewritten ending."));
        assert!(merged.contains("Unrecognizable new opening."));
    }

    #[test]
    fn test_merge_injects_chapter_headers_at_boundaries() {
        let (_dir, layout, store) = setup_processed(
            &[("one. ", 0), ("two. ", 0), ("three.", 0)],
            &[Some("one."), Some("two."), Some("three.")],
        );
        let plan = vec![
            ChapterPlanEntry {
                title_primary: "Opening".into(),
                title_secondary: Some("Ouverture".into()),
                start_chunk_index: 0,
            },
            ChapterPlanEntry {
                title_primary: "Closing".into(),
                title_secondary: None,
                start_chunk_index: 2,
            },
        ];

        let merged = Merger::new(MergeConfig::default())
            .merge(&store, &layout, &plan)
            .unwrap();
        let opening = merged.find("## Opening").unwrap();
        let ouverture = merged.find("## Ouverture").unwrap();
        let closing = merged.find("## Closing").unwrap();
        let two = merged.find("two.").unwrap();
        assert!(opening < ouverture && ouverture < two && two < closing);
        assert!(merged.find("three.").unwrap() > closing);
    }

    #[test]
    fn test_merge_refuses_gap_and_names_missing_index() {
        let (_dir, layout, store) = setup_processed(
            &[("a. ", 0), ("b. ", 0), ("c. ", 0), ("d. ", 0), ("e.", 0)],
            &[Some("a."), Some("b."), None, Some("d."), Some("e.")],
        );

        let err = Merger::new(MergeConfig::default())
            .merge(&store, &layout, &single_chapter())
            .unwrap_err();
        match &err {
            SkrivError::MergeGap(missing) => assert_eq!(*missing, vec![2]),
            other => panic!("expected MergeGap, got {other}"),
        }
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        // One substitution in four chars stays a strong match.
        assert!(similarity("abcd", "abce") >= 0.75);
        assert!(similarity("abcd", "wxyz") < 0.25);
        // Multibyte text compares per char, not per byte.
        assert!(similarity("\u{3053}\u{3093}\u{306b}\u{3061}\u{306f}", "\u{3053}\u{3093}\u{306b}\u{3061}\u{306f}") == 1.0);
    }
}
