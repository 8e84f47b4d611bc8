//! Run directory layout and identifiers.
//!
//! Every pipeline run is keyed by a single run identifier and owns one
//! directory holding its chunk files, processed outputs, manifest, and
//! chapter plan. Runs never share state; batch processing handles one run
//! directory at a time.

use crate::chunking::{ChunkMeta, TextChunk};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Longest permitted run identifier after sanitization.
const MAX_RUN_ID_LEN: usize = 200;

/// Deterministic file layout for one pipeline run.
pub struct RunLayout {
    run_id: String,
    run_dir: PathBuf,
}

impl RunLayout {
    /// Create (or reopen) the layout for `run_id` under `work_dir`.
    pub fn new(work_dir: impl AsRef<Path>, run_id: &str) -> Result<Self> {
        let run_id = sanitize_run_id(run_id);
        let run_dir = work_dir.as_ref().join(&run_id);
        std::fs::create_dir_all(&run_dir)?;
        Ok(Self { run_id, run_dir })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir.join("manifest.json")
    }

    pub fn chapter_plan_path(&self) -> PathBuf {
        self.run_dir.join("chapter_plan.json")
    }

    /// Raw chunk text file for a chunk index.
    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.run_dir.join(format!("chunk_{:03}.txt", index))
    }

    /// Processed output file, distinguishable from the raw chunk.
    pub fn processed_path(&self, index: usize) -> PathBuf {
        self.run_dir.join(format!("processed_{:03}.md", index))
    }

    /// Per-chunk summary file (summarize mode output).
    pub fn summary_path(&self, index: usize) -> PathBuf {
        self.run_dir.join(format!("summary_{:03}.txt", index))
    }

    /// The merged final document.
    pub fn merged_path(&self) -> PathBuf {
        self.run_dir.join("merged.md")
    }

    /// Boundary metadata for all chunks (overlaps, char ranges).
    pub fn chunk_meta_path(&self) -> PathBuf {
        self.run_dir.join("chunks.json")
    }

    /// Write one file per chunk plus the boundary metadata record.
    pub fn write_chunk_files(&self, chunks: &[TextChunk]) -> Result<()> {
        for chunk in chunks {
            std::fs::write(self.chunk_path(chunk.index), &chunk.text)?;
        }
        let meta: Vec<ChunkMeta> = chunks.iter().map(ChunkMeta::from).collect();
        std::fs::write(self.chunk_meta_path(), serde_json::to_string_pretty(&meta)?)?;
        debug!("Wrote {} chunk files to {}", chunks.len(), self.run_dir.display());
        Ok(())
    }

    pub fn load_chunk_meta(&self) -> Result<Vec<ChunkMeta>> {
        let content = std::fs::read_to_string(self.chunk_meta_path())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn read_chunk(&self, index: usize) -> Result<String> {
        Ok(std::fs::read_to_string(self.chunk_path(index))?)
    }

    pub fn read_processed(&self, index: usize) -> Result<String> {
        Ok(std::fs::read_to_string(self.processed_path(index))?)
    }

    pub fn read_summary(&self, index: usize) -> Result<String> {
        Ok(std::fs::read_to_string(self.summary_path(index))?)
    }
}

/// Clean a raw identifier (often a media title) into a safe directory name.
pub fn sanitize_run_id(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let trimmed = sanitized.trim_matches(|c| c == ' ' || c == '.');
    let capped: String = trimmed.chars().take(MAX_RUN_ID_LEN).collect();

    if capped.is_empty() {
        "run".to_string()
    } else {
        capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_run_id("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_sanitize_trims_spaces_and_dots() {
        assert_eq!(sanitize_run_id("  .my talk. "), "my talk");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_run_id(&long).chars().count(), 200);
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_run_id(" .. "), "run");
    }

    #[test]
    fn test_layout_paths_are_deterministic() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "my-talk").unwrap();
        assert!(layout.run_dir().exists());
        assert!(layout.chunk_path(7).ends_with("chunk_007.txt"));
        assert!(layout.processed_path(7).ends_with("processed_007.md"));
        assert!(layout.summary_path(0).ends_with("summary_000.txt"));
        assert!(layout.manifest_path().ends_with("manifest.json"));
    }

    #[test]
    fn test_chunk_files_round_trip() {
        let dir = tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "rt").unwrap();
        let chunks = vec![TextChunk {
            index: 0,
            start_char: 0,
            end_char: 5,
            overlap_with_prev: 0,
            text: "hello".into(),
        }];
        layout.write_chunk_files(&chunks).unwrap();
        assert_eq!(layout.read_chunk(0).unwrap(), "hello");
        let meta = layout.load_chunk_meta().unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].end_char, 5);
    }
}
