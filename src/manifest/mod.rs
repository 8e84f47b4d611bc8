//! Durable per-chunk lifecycle state.
//!
//! The manifest is the resume mechanism: it records, on disk, how far each
//! chunk has progressed so an interrupted run picks up exactly where it
//! stopped. Every mutation is persisted with atomic file replacement
//! (write-to-temp-then-rename), so a crash mid-update leaves the prior
//! state intact and the affected chunk is simply re-attempted.

use crate::error::{Result, SkrivError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Lifecycle state of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    /// Not yet attempted (or explicitly reset for retry).
    Pending,
    /// Summary produced; main transformation still outstanding.
    Summarized,
    /// Transformation output written and recorded.
    Processed,
    /// Last attempt failed; excluded from merge until re-attempted.
    Failed,
}

impl ChunkStatus {
    /// Progress rank used to keep transitions monotonic.
    fn rank(self) -> u8 {
        match self {
            ChunkStatus::Pending | ChunkStatus::Failed => 0,
            ChunkStatus::Summarized => 1,
            ChunkStatus::Processed => 2,
        }
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkStatus::Pending => write!(f, "pending"),
            ChunkStatus::Summarized => write!(f, "summarized"),
            ChunkStatus::Processed => write!(f, "processed"),
            ChunkStatus::Failed => write!(f, "failed"),
        }
    }
}

/// State record for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub chunk_index: usize,
    pub status: ChunkStatus,
    pub output_path: Option<String>,
    pub attempt_count: u32,
}

impl ManifestEntry {
    fn new(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            status: ChunkStatus::Pending,
            output_path: None,
            attempt_count: 0,
        }
    }
}

/// On-disk record of a run's per-chunk state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub total: usize,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    fn new(total: usize) -> Self {
        Self {
            version: MANIFEST_VERSION,
            total,
            created_at: Utc::now(),
            entries: (0..total).map(ManifestEntry::new).collect(),
        }
    }

    /// Get the entry for a chunk index.
    pub fn get(&self, chunk_index: usize) -> Option<&ManifestEntry> {
        self.entries.get(chunk_index)
    }

    /// All entries not yet Processed, in ascending index order.
    pub fn pending_entries(&self) -> Vec<&ManifestEntry> {
        self.entries
            .iter()
            .filter(|e| e.status != ChunkStatus::Processed)
            .collect()
    }

    /// True iff every entry is Processed.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.status == ChunkStatus::Processed)
    }

    /// Indices of entries that failed and exhausted their attempt budget.
    pub fn exhausted_entries(&self, max_attempts: u32) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| e.status == ChunkStatus::Failed && e.attempt_count >= max_attempts)
            .map(|e| e.chunk_index)
            .collect()
    }

    /// Count of entries per status: (processed, failed, pending).
    pub fn status_counts(&self) -> (usize, usize, usize) {
        let mut processed = 0;
        let mut failed = 0;
        let mut pending = 0;
        for entry in &self.entries {
            match entry.status {
                ChunkStatus::Processed => processed += 1,
                ChunkStatus::Failed => failed += 1,
                ChunkStatus::Pending | ChunkStatus::Summarized => pending += 1,
            }
        }
        (processed, failed, pending)
    }

    fn validate(&self) -> Result<()> {
        if self.entries.len() != self.total {
            return Err(SkrivError::ManifestCorrupt(format!(
                "entry count {} does not match total {}",
                self.entries.len(),
                self.total
            )));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.chunk_index != i {
                return Err(SkrivError::ManifestCorrupt(format!(
                    "entry {} carries chunk_index {}",
                    i, entry.chunk_index
                )));
            }
        }
        Ok(())
    }
}

/// Handle that owns the manifest file and persists every mutation.
pub struct ManifestStore {
    path: PathBuf,
    manifest: Manifest,
}

impl ManifestStore {
    /// Load an existing manifest or create a fresh one.
    ///
    /// Idempotent: an existing manifest with a matching `total` is reused so
    /// an interrupted run resumes. A mismatching or unreadable manifest is
    /// stale and gets rebuilt from scratch.
    pub fn load_or_create(path: impl Into<PathBuf>, total: usize) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            match Self::read(&path) {
                Ok(manifest) if manifest.total == total => {
                    let (processed, failed, pending) = manifest.status_counts();
                    info!(
                        "Resuming manifest: {} processed, {} failed, {} pending",
                        processed, failed, pending
                    );
                    return Ok(Self { path, manifest });
                }
                Ok(manifest) => {
                    warn!(
                        "Manifest total {} does not match {} chunks, rebuilding",
                        manifest.total, total
                    );
                }
                Err(e) => {
                    warn!("Manifest unreadable ({}), rebuilding", e);
                }
            }
        }

        let store = Self {
            path,
            manifest: Manifest::new(total),
        };
        store.save()?;
        Ok(store)
    }

    /// Open an existing manifest, failing if it is missing or corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let manifest = Self::read(&path)?;
        Ok(Self { path, manifest })
    }

    fn read(path: &Path) -> Result<Manifest> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| SkrivError::ManifestCorrupt(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// The manifest's current state.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the outcome of an attempt on one chunk and persist.
    ///
    /// Transitions are monotonic: a regression (e.g. Processed back to
    /// Pending) is rejected, except for marking Failed which is always
    /// allowed on a non-Processed entry. `attempt_count` increments on
    /// every recorded attempt, success or failure.
    pub fn update(
        &mut self,
        chunk_index: usize,
        status: ChunkStatus,
        output_path: Option<String>,
    ) -> Result<()> {
        let entry = self
            .manifest
            .entries
            .get_mut(chunk_index)
            .ok_or_else(|| {
                SkrivError::Manifest(format!("chunk index {} out of range", chunk_index))
            })?;

        if entry.status == ChunkStatus::Processed {
            return Err(SkrivError::Manifest(format!(
                "chunk {} is already processed",
                chunk_index
            )));
        }
        if status != ChunkStatus::Failed && status.rank() < entry.status.rank() {
            return Err(SkrivError::Manifest(format!(
                "chunk {} cannot move from {} to {}",
                chunk_index, entry.status, status
            )));
        }

        entry.status = status;
        entry.attempt_count += 1;
        if output_path.is_some() {
            entry.output_path = output_path;
        }

        self.save()
    }

    /// Reset Failed entries to Pending for an explicit retry and persist.
    /// Returns the number of entries reset.
    pub fn reset_failed(&mut self) -> Result<usize> {
        let mut reset = 0;
        for entry in &mut self.manifest.entries {
            if entry.status == ChunkStatus::Failed {
                entry.status = ChunkStatus::Pending;
                reset += 1;
            }
        }
        if reset > 0 {
            self.save()?;
        }
        Ok(reset)
    }

    /// Archive the manifest after a successful merge by renaming it aside.
    pub fn archive(self) -> Result<()> {
        let archived = self.path.with_extension("json.done");
        std::fs::rename(&self.path, &archived)?;
        info!("Archived manifest to {}", archived.display());
        Ok(())
    }

    /// Persist the manifest with atomic file replacement.
    fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| SkrivError::Manifest("manifest path has no parent".into()))?;
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(&self.manifest)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), json)?;
        tmp.persist(&self.path)
            .map_err(|e| SkrivError::Manifest(format!("atomic replace failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_initializes_pending_entries() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::load_or_create(dir.path().join("manifest.json"), 4).unwrap();
        let manifest = store.manifest();
        assert_eq!(manifest.total, 4);
        assert_eq!(manifest.entries.len(), 4);
        assert!(manifest
            .entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.chunk_index == i && e.status == ChunkStatus::Pending));
        assert!(!manifest.is_complete());
    }

    #[test]
    fn test_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut store = ManifestStore::load_or_create(&path, 3).unwrap();
        store
            .update(1, ChunkStatus::Processed, Some("processed_001.md".into()))
            .unwrap();

        // Same total: reuse, keeping prior progress.
        let store = ManifestStore::load_or_create(&path, 3).unwrap();
        let entry = store.manifest().get(1).unwrap();
        assert_eq!(entry.status, ChunkStatus::Processed);
        assert_eq!(entry.output_path.as_deref(), Some("processed_001.md"));
        assert_eq!(entry.attempt_count, 1);
    }

    #[test]
    fn test_total_mismatch_rebuilds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut store = ManifestStore::load_or_create(&path, 3).unwrap();
        store.update(0, ChunkStatus::Processed, None).unwrap();

        let store = ManifestStore::load_or_create(&path, 5).unwrap();
        assert_eq!(store.manifest().total, 5);
        assert!(store
            .manifest()
            .entries
            .iter()
            .all(|e| e.status == ChunkStatus::Pending));
    }

    #[test]
    fn test_corrupt_manifest_rebuilds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ManifestStore::load_or_create(&path, 2).unwrap();
        assert_eq!(store.manifest().total, 2);
    }

    #[test]
    fn test_pending_entries_ascending_and_excludes_processed() {
        let dir = tempdir().unwrap();
        let mut store =
            ManifestStore::load_or_create(dir.path().join("manifest.json"), 5).unwrap();
        store.update(2, ChunkStatus::Processed, None).unwrap();
        store.update(4, ChunkStatus::Failed, None).unwrap();

        let pending: Vec<usize> = store
            .manifest()
            .pending_entries()
            .iter()
            .map(|e| e.chunk_index)
            .collect();
        assert_eq!(pending, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_is_complete_requires_all_processed() {
        let dir = tempdir().unwrap();
        let mut store =
            ManifestStore::load_or_create(dir.path().join("manifest.json"), 2).unwrap();
        store.update(0, ChunkStatus::Processed, None).unwrap();
        assert!(!store.manifest().is_complete());
        store.update(1, ChunkStatus::Processed, None).unwrap();
        assert!(store.manifest().is_complete());
    }

    #[test]
    fn test_no_regression_from_processed() {
        let dir = tempdir().unwrap();
        let mut store =
            ManifestStore::load_or_create(dir.path().join("manifest.json"), 1).unwrap();
        store.update(0, ChunkStatus::Processed, None).unwrap();
        assert!(store.update(0, ChunkStatus::Pending, None).is_err());
        assert!(store.update(0, ChunkStatus::Failed, None).is_err());
    }

    #[test]
    fn test_reset_failed_enables_retry() {
        let dir = tempdir().unwrap();
        let mut store =
            ManifestStore::load_or_create(dir.path().join("manifest.json"), 3).unwrap();
        store.update(1, ChunkStatus::Failed, None).unwrap();
        store.update(2, ChunkStatus::Processed, None).unwrap();

        assert_eq!(store.reset_failed().unwrap(), 1);
        assert_eq!(store.manifest().get(1).unwrap().status, ChunkStatus::Pending);
        // Failure history survives the reset.
        assert_eq!(store.manifest().get(1).unwrap().attempt_count, 1);
        assert_eq!(store.manifest().get(2).unwrap().status, ChunkStatus::Processed);
    }

    #[test]
    fn test_exhausted_entries() {
        let dir = tempdir().unwrap();
        let mut store =
            ManifestStore::load_or_create(dir.path().join("manifest.json"), 2).unwrap();
        store.update(0, ChunkStatus::Failed, None).unwrap();
        store.update(0, ChunkStatus::Failed, None).unwrap();
        store.update(0, ChunkStatus::Failed, None).unwrap();
        store.update(1, ChunkStatus::Failed, None).unwrap();

        assert_eq!(store.manifest().exhausted_entries(3), vec![0]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        {
            let mut store = ManifestStore::load_or_create(&path, 2).unwrap();
            store
                .update(0, ChunkStatus::Summarized, Some("summary_000.txt".into()))
                .unwrap();
        }
        let store = ManifestStore::open(&path).unwrap();
        let entry = store.manifest().get(0).unwrap();
        assert_eq!(entry.status, ChunkStatus::Summarized);
        assert_eq!(entry.output_path.as_deref(), Some("summary_000.txt"));
    }
}
