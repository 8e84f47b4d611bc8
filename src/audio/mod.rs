//! Silence-aware audio segment planning.
//!
//! Plans size-bounded cut points over an oversized audio source, preferring
//! cuts at silence so the downstream transcription collaborator receives
//! segments that start and end at natural pauses. Only boundary metadata is
//! produced here; the actual media extraction is delegated to an external
//! collaborator given the segment list.

mod silence;

pub use silence::{FfmpegSilenceProbe, SilenceInterval, SilenceProbe};

use crate::error::{Result, SkrivError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// One planned segment of the source audio.
///
/// Segments are contiguous, ordered, non-overlapping, and cover the source
/// exactly; every segment's byte size stays within the configured maximum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSegment {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub byte_size: u64,
    /// Whether the segment's end cut was snapped to a silence midpoint.
    pub is_silence_aligned: bool,
}

/// The audio asset to be segmented.
#[derive(Debug, Clone)]
pub struct AudioSource {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub byte_size: u64,
}

/// Inspect an audio file on disk: size from the filesystem, duration via
/// ffprobe with JSON output.
pub async fn probe_source(path: &std::path::Path) -> Result<AudioSource> {
    let byte_size = std::fs::metadata(path)?.len();

    let result = tokio::process::Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SkrivError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(SkrivError::Segmentation(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(SkrivError::Segmentation("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| SkrivError::Segmentation("Invalid ffprobe output".into()))?;

    let duration_seconds = parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| SkrivError::Segmentation("Could not determine audio duration".into()))?;

    Ok(AudioSource {
        path: path.to_path_buf(),
        duration_seconds,
        byte_size,
    })
}

/// Configuration for segment planning.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Hard upper bound on segment size in bytes.
    pub max_segment_bytes: u64,
    /// Half-width of the silence search window around each naive cut.
    pub search_window_seconds: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: 10 * 1024 * 1024,
            search_window_seconds: 60.0,
        }
    }
}

/// Plans size-bounded, silence-aligned segments over an audio source.
pub struct AudioSegmenter {
    config: SegmenterConfig,
}

impl AudioSegmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        if config.max_segment_bytes == 0 {
            return Err(SkrivError::Config("max_segment_bytes must be positive".into()));
        }
        if config.search_window_seconds < 0.0 {
            return Err(SkrivError::Config(
                "search_window_seconds must be non-negative".into(),
            ));
        }
        Ok(Self { config })
    }

    /// Plan segments for `source`, probing for silence near each cut.
    ///
    /// Naive cut points fall at fixed byte intervals of the maximum segment
    /// size, measured from the previous actual cut. Each non-final cut is
    /// snapped to the nearest silence midpoint inside the search window,
    /// unless the snap would push the segment over the size cap. A failing
    /// probe degrades that boundary to the naive cut; the split itself
    /// never fails.
    pub async fn segment(
        &self,
        source: &AudioSource,
        probe: &dyn SilenceProbe,
    ) -> Result<Vec<AudioSegment>> {
        if source.duration_seconds <= 0.0 || source.byte_size == 0 {
            return Err(SkrivError::InvalidInput(
                "audio source has no duration or size".into(),
            ));
        }

        let max = self.config.max_segment_bytes;
        if source.byte_size <= max {
            return Ok(vec![AudioSegment {
                index: 0,
                start_seconds: 0.0,
                end_seconds: source.duration_seconds,
                byte_size: source.byte_size,
                is_silence_aligned: false,
            }]);
        }

        let bytes_per_second = source.byte_size as f64 / source.duration_seconds;
        let window = self.config.search_window_seconds;

        let mut segments = Vec::new();
        let mut cut_seconds = 0.0f64;
        let mut cut_bytes = 0u64;
        let mut probe_broken = false;

        while source.byte_size - cut_bytes > max {
            let naive_bytes = cut_bytes + max;
            let naive_seconds = naive_bytes as f64 / bytes_per_second;

            let snapped = if probe_broken {
                None
            } else {
                let window_start = (naive_seconds - window).max(cut_seconds);
                let window_end = (naive_seconds + window).min(source.duration_seconds);
                match probe.probe(&source.path, window_start, window_end).await {
                    Ok(intervals) => {
                        pick_cut(&intervals, naive_seconds, cut_seconds, window)
                    }
                    Err(e) => {
                        // Degrade to naive cuts for the rest of the run.
                        warn!("Silence probe failed ({}), using naive cut points", e);
                        probe_broken = true;
                        None
                    }
                }
            };

            let (end_seconds, end_bytes, aligned) = match snapped {
                Some(t) => {
                    let bytes = (t * bytes_per_second).round() as u64;
                    if bytes > naive_bytes {
                        // Snapping forward would exceed the size cap.
                        debug!(
                            "Rejecting forward snap at {:.1}s, falling back to naive cut",
                            t
                        );
                        (naive_seconds, naive_bytes, false)
                    } else {
                        (t, bytes, true)
                    }
                }
                None => (naive_seconds, naive_bytes, false),
            };

            segments.push(AudioSegment {
                index: segments.len(),
                start_seconds: cut_seconds,
                end_seconds,
                byte_size: end_bytes - cut_bytes,
                is_silence_aligned: aligned,
            });
            cut_seconds = end_seconds;
            cut_bytes = end_bytes;
        }

        segments.push(AudioSegment {
            index: segments.len(),
            start_seconds: cut_seconds,
            end_seconds: source.duration_seconds,
            byte_size: source.byte_size - cut_bytes,
            is_silence_aligned: false,
        });

        info!(
            "Planned {} segments ({} silence-aligned)",
            segments.len(),
            segments.iter().filter(|s| s.is_silence_aligned).count()
        );
        Ok(segments)
    }
}

/// Choose the silence midpoint nearest the naive cut, if any usable one
/// exists inside the deviation window.
fn pick_cut(
    intervals: &[SilenceInterval],
    naive_seconds: f64,
    prev_cut: f64,
    window: f64,
) -> Option<f64> {
    intervals
        .iter()
        .map(|iv| iv.midpoint())
        .filter(|&m| m > prev_cut && (m - naive_seconds).abs() <= window)
        .min_by(|a, b| {
            let da = (a - naive_seconds).abs();
            let db = (b - naive_seconds).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
}
