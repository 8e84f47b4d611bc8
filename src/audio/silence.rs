//! Silence detection over audio via ffmpeg's silencedetect filter.

use crate::error::{Result, SkrivError};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A detected silence interval, in seconds from the start of the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

impl SilenceInterval {
    /// Midpoint of the interval, the preferred cut position.
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// External boundary for silence detection.
///
/// Implementations probe a bounded window of the source and return candidate
/// silence intervals inside it, possibly none.
#[async_trait]
pub trait SilenceProbe: Send + Sync {
    async fn probe(
        &self,
        audio_path: &Path,
        window_start: f64,
        window_end: f64,
    ) -> Result<Vec<SilenceInterval>>;
}

/// Silence probe that shells out to ffmpeg's silencedetect filter.
pub struct FfmpegSilenceProbe {
    /// Noise threshold in dB below which audio counts as silence.
    noise_db: f64,
    /// Minimum silence duration in seconds.
    min_duration: f64,
}

impl FfmpegSilenceProbe {
    pub fn new() -> Self {
        Self {
            noise_db: -30.0,
            min_duration: 0.5,
        }
    }

    pub fn with_thresholds(noise_db: f64, min_duration: f64) -> Self {
        Self {
            noise_db,
            min_duration,
        }
    }
}

impl Default for FfmpegSilenceProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SilenceProbe for FfmpegSilenceProbe {
    async fn probe(
        &self,
        audio_path: &Path,
        window_start: f64,
        window_end: f64,
    ) -> Result<Vec<SilenceInterval>> {
        let window_len = (window_end - window_start).max(0.0);

        let result = Command::new("ffmpeg")
            .arg("-ss").arg(format!("{:.3}", window_start))
            .arg("-t").arg(format!("{:.3}", window_len))
            .arg("-i").arg(audio_path)
            .arg("-af")
            .arg(format!(
                "silencedetect=noise={}dB:d={}",
                self.noise_db, self.min_duration
            ))
            .arg("-f").arg("null")
            .arg("-")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SkrivError::ToolNotFound("ffmpeg".into()));
            }
            Err(e) => {
                return Err(SkrivError::ToolFailed(format!("ffmpeg silencedetect: {e}")));
            }
        };

        // silencedetect reports on stderr, even on nonzero exit.
        let stderr = String::from_utf8_lossy(&output.stderr);
        let intervals = parse_silencedetect(&stderr, window_start);
        debug!(
            "Found {} silence intervals in [{:.1}s, {:.1}s]",
            intervals.len(),
            window_start,
            window_end
        );
        Ok(intervals)
    }
}

/// Parse ffmpeg silencedetect stderr output into intervals.
///
/// Timestamps in the output are relative to the seek position, so `offset`
/// rebases them onto the full source timeline.
fn parse_silencedetect(stderr: &str, offset: f64) -> Vec<SilenceInterval> {
    let start_re = Regex::new(r"silence_start: ([\d.]+)").expect("valid regex");
    let end_re = Regex::new(r"silence_end: ([\d.]+)").expect("valid regex");

    let starts: Vec<f64> = start_re
        .captures_iter(stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    let ends: Vec<f64> = end_re
        .captures_iter(stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();

    starts
        .into_iter()
        .zip(ends)
        .map(|(s, e)| SilenceInterval {
            start: s + offset,
            end: e + offset,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_silencedetect_output() {
        let stderr = "\
[silencedetect @ 0x5555] silence_start: 10.5\n\
[silencedetect @ 0x5555] silence_end: 11.2 | silence_duration: 0.7\n\
[silencedetect @ 0x5555] silence_start: 42.0\n\
[silencedetect @ 0x5555] silence_end: 43.0 | silence_duration: 1.0\n";

        let intervals = parse_silencedetect(stderr, 0.0);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].start, 10.5);
        assert_eq!(intervals[0].end, 11.2);
        assert!((intervals[0].midpoint() - 10.85).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rebases_onto_window_offset() {
        let stderr = "silence_start: 1.0\nsilence_end: 2.0 | silence_duration: 1.0\n";
        let intervals = parse_silencedetect(stderr, 100.0);
        assert_eq!(intervals[0].start, 101.0);
        assert_eq!(intervals[0].end, 102.0);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_silencedetect("frame=  100 fps=0.0", 0.0).is_empty());
    }

    #[test]
    fn test_parse_unterminated_trailing_silence() {
        // A silence running to EOF has no matching silence_end.
        let stderr = "silence_start: 5.0\n";
        assert!(parse_silencedetect(stderr, 0.0).is_empty());
    }
}
