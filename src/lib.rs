//! Skriv - Resumable Long-Document Processing
//!
//! A CLI tool for turning oversized transcripts into structured documents
//! through a durable, resumable chunk-processing pipeline.
//!
//! The name "Skriv" comes from the Norwegian/Scandinavian word for "write."
//!
//! # Overview
//!
//! Skriv allows you to:
//! - Split oversized audio into API-sized segments at natural pause points
//! - Split long transcripts into sentence-aligned, overlapping chunks
//! - Track per-chunk processing state on disk so interrupted runs resume
//! - Plan a chapter structure from external markers or chunk summaries
//! - Dispatch each chunk through an isolated LLM transformation
//! - Merge processed chunks back into one document with chapter headers
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `audio` - Silence-aware audio segment planning
//! - `chunking` - Sentence-aligned text chunking with overlap
//! - `manifest` - Durable per-chunk lifecycle state (the resume mechanism)
//! - `chapters` - Chapter plan derivation and validation
//! - `transform` - The external transformation call boundary
//! - `dispatch` - Sequential chunk dispatch over pending manifest entries
//! - `merge` - Overlap-deduplicating reassembly with chapter headers
//! - `run` - Run directory layout and identifiers
//!
//! # Example
//!
//! ```rust,no_run
//! use skriv::chunking::{ChunkerConfig, TextChunker};
//! use skriv::manifest::ManifestStore;
//! use skriv::run::RunLayout;
//!
//! fn main() -> skriv::Result<()> {
//!     let layout = RunLayout::new("/tmp/skriv-work", "my-talk")?;
//!     let chunker = TextChunker::new(ChunkerConfig::default())?;
//!     let chunks = chunker.chunk("the full transcript text ...");
//!
//!     let store = ManifestStore::load_or_create(layout.manifest_path(), chunks.len())?;
//!     println!("{} chunks pending", store.manifest().pending_entries().len());
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod chapters;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod openai;
pub mod run;
pub mod transform;

pub use error::{Result, SkrivError};
