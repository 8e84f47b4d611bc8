//! The external transformation call boundary.
//!
//! Every chunk is transformed through an isolated, stateless call: the call
//! receives only that chunk's text plus a fixed, chunk-independent
//! instruction, and returns transformed text. No shared memory or history
//! between calls; this independence is what makes dispatch resumable.

mod openai;

pub use openai::OpenAiTransformer;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The closed set of processing modes a chunk can be dispatched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Restructure raw transcript text into readable, sectioned prose.
    Structure,
    /// Translate the chunk, preserving structure.
    Translate,
    /// Produce a one/two-sentence summary of the chunk.
    Summarize,
}

impl TransformMode {
    /// The fixed instruction sent alongside every chunk in this mode.
    pub fn instruction(self) -> &'static str {
        match self {
            TransformMode::Structure => {
                "Restructure the following transcript text into well-formed \
                 paragraphs with markdown section headers (##). Preserve all \
                 content; do not summarize."
            }
            TransformMode::Translate => {
                "Translate the following text, keeping paragraph and section \
                 structure intact."
            }
            TransformMode::Summarize => {
                "Summarize the following text in one or two sentences."
            }
        }
    }
}

impl std::str::FromStr for TransformMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "structure" => Ok(TransformMode::Structure),
            "translate" => Ok(TransformMode::Translate),
            "summarize" => Ok(TransformMode::Summarize),
            _ => Err(format!("Unknown transform mode: {}", s)),
        }
    }
}

impl std::fmt::Display for TransformMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformMode::Structure => write!(f, "structure"),
            TransformMode::Translate => write!(f, "translate"),
            TransformMode::Summarize => write!(f, "summarize"),
        }
    }
}

/// Trait for the external transformation collaborator.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transform one chunk's text under a fixed instruction mode.
    async fn transform(&self, mode: TransformMode, text: &str) -> Result<String>;

    /// Ask the collaborator for a chapter plan over ordered chunk summaries.
    /// Returns the raw response; parsing and validation happen in `chapters`.
    async fn plan_chapters(&self, summaries: &[String]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_through_str() {
        for mode in [
            TransformMode::Structure,
            TransformMode::Translate,
            TransformMode::Summarize,
        ] {
            let parsed: TransformMode = mode.to_string().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert!("chapterize".parse::<TransformMode>().is_err());
    }
}
