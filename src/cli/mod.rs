//! CLI module for Skriv.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Skriv - Resumable Long-Document Processing
///
/// A CLI tool that turns long raw transcripts into structured documents,
/// one durable step at a time. The name "Skriv" comes from the
/// Norwegian/Scandinavian word for "write."
#[derive(Parser, Debug)]
#[command(name = "skriv")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan size-bounded, silence-aligned segments for an oversized audio file
    Segment {
        /// Path to the audio file
        input: String,

        /// Write the segment plan JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Split a transcript text file into overlapping chunks and create the run
    Chunk {
        /// Path to the transcript text file
        input: String,

        /// Run identifier (defaults to the input file stem)
        #[arg(short, long)]
        run_id: Option<String>,
    },

    /// Derive a chapter plan for a run
    Plan {
        /// Run identifier
        run_id: String,

        /// JSON file with externally supplied chapter markers; without it
        /// the plan is derived from per-chunk summaries
        #[arg(short, long)]
        markers: Option<String>,

        /// Source duration in seconds (required with --markers)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Model to use for summary-based planning
        #[arg(long)]
        model: Option<String>,
    },

    /// Dispatch pending chunks through the transformation
    Dispatch {
        /// Run identifier
        run_id: String,

        /// Transformation mode (structure, translate, summarize)
        #[arg(short, long, default_value = "structure")]
        mode: String,

        /// Reset failed chunks back to pending before dispatching
        #[arg(long)]
        retry_failed: bool,

        /// Model to use for the transformation
        #[arg(long)]
        model: Option<String>,
    },

    /// Merge processed chunks into the final document
    Merge {
        /// Run identifier
        run_id: String,

        /// Archive the manifest after a successful merge
        #[arg(long)]
        archive: bool,
    },

    /// Show the manifest status of a run
    Status {
        /// Run identifier
        run_id: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
