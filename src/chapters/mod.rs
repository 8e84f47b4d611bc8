//! Chapter plan derivation and validation.
//!
//! A chapter plan assigns every chunk to exactly one chapter. Plans come
//! from one of two sources: externally supplied chapter markers with
//! timestamps, or an external planning call over per-chunk summaries.
//! Either way the result obeys the same invariants: entries ordered by
//! strictly increasing `start_chunk_index`, first entry at chunk 0.

use crate::chunking::TextChunk;
use crate::error::{Result, SkrivError};
use crate::transform::Transformer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Title used for a synthesized leading chapter.
const LEAD_IN_TITLE: &str = "Introduction";

/// One chapter in the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterPlanEntry {
    pub title_primary: String,
    /// Optional translated title, rendered as a second header line.
    pub title_secondary: Option<String>,
    pub start_chunk_index: usize,
}

/// An externally supplied chapter marker (e.g. from video metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterMarker {
    pub title: String,
    pub start_seconds: f64,
}

/// Candidate entry as returned by the external planning call.
#[derive(Debug, Deserialize)]
struct PlanCandidate {
    title: String,
    #[serde(default)]
    title_secondary: Option<String>,
    start_chunk_index: usize,
}

/// Derives chapter plans over a run's chunks.
pub struct ChapterPlanner {
    total_chunks: usize,
}

impl ChapterPlanner {
    pub fn new(total_chunks: usize) -> Result<Self> {
        if total_chunks == 0 {
            return Err(SkrivError::Planning("no chunks to plan over".into()));
        }
        Ok(Self { total_chunks })
    }

    /// Map external chapter markers onto chunk indices.
    ///
    /// Each marker's timestamp is converted to an estimated character offset
    /// via `chars_per_second` and assigned to the chunk whose range contains
    /// it. Markers mapping to the same chunk collapse, keeping the earliest
    /// title. A marker past the last chunk maps to the last chunk.
    pub fn from_markers(
        &self,
        markers: &[ChapterMarker],
        chunks: &[TextChunk],
        chars_per_second: f64,
    ) -> Vec<ChapterPlanEntry> {
        let mut entries: Vec<ChapterPlanEntry> = Vec::new();

        for marker in markers {
            let est_char = (marker.start_seconds * chars_per_second).max(0.0) as usize;
            let chunk_index = chunks
                .iter()
                .find(|c| est_char >= c.start_char && est_char < c.end_char)
                .map(|c| c.index)
                .unwrap_or_else(|| chunks.len().saturating_sub(1));

            if entries.iter().any(|e| e.start_chunk_index == chunk_index) {
                debug!(
                    "Chapter '{}' collapses into chunk {}, keeping earliest title",
                    marker.title, chunk_index
                );
                continue;
            }
            entries.push(ChapterPlanEntry {
                title_primary: marker.title.clone(),
                title_secondary: None,
                start_chunk_index: chunk_index,
            });
        }

        self.repair(entries)
    }

    /// Derive a plan from per-chunk summaries via the external planning call.
    ///
    /// Requires exactly one summary per chunk. The raw response is parsed as
    /// a JSON array of candidates; ordering violations are repaired rather
    /// than failed.
    pub async fn from_summaries(
        &self,
        transformer: &dyn Transformer,
        summaries: &[String],
    ) -> Result<Vec<ChapterPlanEntry>> {
        if summaries.len() != self.total_chunks {
            return Err(SkrivError::Planning(format!(
                "need {} summaries, got {}",
                self.total_chunks,
                summaries.len()
            )));
        }

        let response = transformer.plan_chapters(summaries).await?;
        let candidates = parse_candidates(&response)?;
        info!("Planning call returned {} chapter candidates", candidates.len());

        let entries = candidates
            .into_iter()
            .map(|c| ChapterPlanEntry {
                title_primary: c.title,
                title_secondary: c.title_secondary,
                start_chunk_index: c.start_chunk_index,
            })
            .collect();

        Ok(self.repair(entries))
    }

    /// Enforce the plan invariants, repairing violations.
    ///
    /// Out-of-range and out-of-order entries are dropped; a missing leading
    /// chapter is synthesized; an empty plan falls back to a single chapter
    /// spanning everything.
    fn repair(&self, entries: Vec<ChapterPlanEntry>) -> Vec<ChapterPlanEntry> {
        let mut plan: Vec<ChapterPlanEntry> = Vec::new();

        for entry in entries {
            if entry.start_chunk_index >= self.total_chunks {
                warn!(
                    "Dropping chapter '{}': start {} out of range",
                    entry.title_primary, entry.start_chunk_index
                );
                continue;
            }
            if let Some(last) = plan.last() {
                if entry.start_chunk_index <= last.start_chunk_index {
                    warn!(
                        "Dropping out-of-order chapter '{}' at {}",
                        entry.title_primary, entry.start_chunk_index
                    );
                    continue;
                }
            }
            plan.push(entry);
        }

        if plan.is_empty() {
            // Single chapter spanning the whole text.
            return vec![ChapterPlanEntry {
                title_primary: LEAD_IN_TITLE.to_string(),
                title_secondary: None,
                start_chunk_index: 0,
            }];
        }

        if plan[0].start_chunk_index != 0 {
            plan.insert(
                0,
                ChapterPlanEntry {
                    title_primary: LEAD_IN_TITLE.to_string(),
                    title_secondary: None,
                    start_chunk_index: 0,
                },
            );
        }

        plan
    }
}

/// Extract the JSON array from a possibly chatty planning response.
fn parse_candidates(response: &str) -> Result<Vec<PlanCandidate>> {
    let json_start = response.find('[');
    let json_end = response.rfind(']');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    serde_json::from_str(json_str).map_err(|e| {
        // Char-wise truncation: the response may contain multibyte text.
        let preview: String = response.chars().take(500).collect();
        SkrivError::Planning(format!(
            "Failed to parse planning response: {}. Response was: {}",
            e, preview
        ))
    })
}

/// Persist a validated plan as an ordered JSON array.
pub fn save_plan(path: &Path, plan: &[ChapterPlanEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(plan)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a plan, re-checking the ordering invariants.
pub fn load_plan(path: &Path) -> Result<Vec<ChapterPlanEntry>> {
    let content = std::fs::read_to_string(path)?;
    let plan: Vec<ChapterPlanEntry> = serde_json::from_str(&content)?;

    if plan.is_empty() {
        return Err(SkrivError::Planning("chapter plan is empty".into()));
    }
    if plan[0].start_chunk_index != 0 {
        return Err(SkrivError::Planning(
            "chapter plan does not start at chunk 0".into(),
        ));
    }
    for pair in plan.windows(2) {
        if pair[1].start_chunk_index <= pair[0].start_chunk_index {
            return Err(SkrivError::Planning(format!(
                "chapter starts not strictly increasing at index {}",
                pair[1].start_chunk_index
            )));
        }
    }
    Ok(plan)
}
