//! Sentence-aligned text chunking with overlap.
//!
//! Splits a long transcript into size-bounded chunks whose boundaries prefer
//! sentence ends, with a small overlapping span carried between consecutive
//! chunks for cross-chunk context.

use crate::error::{Result, SkrivError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Sentence-ending punctuation accepted as a cut point.
const SENTENCE_ENDINGS: [char; 6] = ['.', '!', '?', '\u{3002}', '\u{ff01}', '\u{ff1f}'];

/// A chunk of transcript text.
///
/// `text` includes the overlap prefix copied from the previous chunk;
/// `start_char` and `end_char` delimit the chunk's own (non-overlap) span.
/// All offsets are character offsets, not byte offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position of this chunk in the sequence.
    pub index: usize,
    /// Character offset where this chunk's own content begins.
    pub start_char: usize,
    /// Character offset one past this chunk's own content.
    pub end_char: usize,
    /// Number of characters at the head of `text` duplicated from the
    /// previous chunk. Zero for chunk 0.
    pub overlap_with_prev: usize,
    /// Chunk text, overlap prefix included.
    pub text: String,
}

impl TextChunk {
    /// The chunk's own content, overlap prefix stripped.
    pub fn own_text(&self) -> String {
        self.text.chars().skip(self.overlap_with_prev).collect()
    }
}

/// Boundary metadata for a chunk, persisted alongside the chunk files so the
/// merger knows each chunk's overlap without re-reading the source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub overlap_with_prev: usize,
}

impl From<&TextChunk> for ChunkMeta {
    fn from(chunk: &TextChunk) -> Self {
        Self {
            index: chunk.index,
            start_char: chunk.start_char,
            end_char: chunk.end_char,
            overlap_with_prev: chunk.overlap_with_prev,
        }
    }
}

/// Configuration for the text chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap carried from the previous chunk, in characters.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8000,
            overlap: 100,
        }
    }
}

/// Splits text into ordered, overlapping, sentence-aligned chunks.
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    /// Create a chunker, rejecting invalid size/overlap combinations.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(SkrivError::Chunking("chunk_size must be positive".into()));
        }
        if config.chunk_size <= config.overlap {
            return Err(SkrivError::Chunking(format!(
                "chunk_size ({}) must exceed overlap ({})",
                config.chunk_size, config.overlap
            )));
        }
        Ok(Self { config })
    }

    /// Split `text` into chunks.
    ///
    /// The union of all chunks with overlap prefixes removed reproduces the
    /// input exactly. Empty input produces no chunks.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        if total == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < total {
            let hard_end = (start + self.config.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                // Prefer a sentence end; never search back past half a chunk.
                let floor = start + self.config.chunk_size / 2;
                find_sentence_boundary(&chars, floor, hard_end).unwrap_or(hard_end)
            };

            let index = chunks.len();
            let overlap = if index == 0 {
                0
            } else {
                self.config.overlap.min(start)
            };
            let chunk_text: String = chars[start - overlap..end].iter().collect();

            debug!(
                "Chunk {}: chars [{}, {}) with {} overlap",
                index, start, end, overlap
            );

            chunks.push(TextChunk {
                index,
                start_char: start,
                end_char: end,
                overlap_with_prev: overlap,
                text: chunk_text,
            });

            start = end;
        }

        info!("Split {} chars into {} chunks", total, chunks.len());
        chunks
    }
}

/// Find the last sentence boundary in `(floor, limit]`.
///
/// Returns the char offset just after the sentence-ending punctuation (or
/// after a blank line), so the cut falls between sentences.
fn find_sentence_boundary(chars: &[char], floor: usize, limit: usize) -> Option<usize> {
    let mut pos = limit;
    while pos > floor && pos > 0 {
        let prev = chars[pos - 1];
        if SENTENCE_ENDINGS.contains(&prev) {
            return Some(pos);
        }
        // Paragraph break counts as a boundary too.
        if prev == '\n' && pos >= 2 && chars[pos - 2] == '\n' {
            return Some(pos);
        }
        pos -= 1;
    }
    None
}
