//! Segment command implementation.

use crate::audio::{probe_source, AudioSegmenter, FfmpegSilenceProbe, SegmenterConfig};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use std::path::Path;

/// Run the segment command.
pub async fn run_segment(input: &str, output: Option<String>, settings: Settings) -> Result<()> {
    let path = Path::new(input);
    if !path.exists() {
        anyhow::bail!("Audio file not found: {}", input);
    }

    let spinner = Output::spinner("Probing audio source...");
    let source = probe_source(path).await?;
    spinner.finish_and_clear();

    Output::info(&format!(
        "Source: {:.1} MB, {}",
        source.byte_size as f64 / (1024.0 * 1024.0),
        crate::cli::output::format_duration(source.duration_seconds)
    ));

    let segmenter = AudioSegmenter::new(SegmenterConfig {
        max_segment_bytes: settings.segmenting.max_segment_bytes(),
        search_window_seconds: settings.segmenting.search_window_seconds,
    })?;
    let probe = FfmpegSilenceProbe::with_thresholds(
        settings.segmenting.silence_noise_db,
        settings.segmenting.min_silence_seconds,
    );

    let spinner = Output::spinner("Planning segments...");
    let segments = segmenter.segment(&source, &probe).await?;
    spinner.finish_and_clear();

    Output::success(&format!("Planned {} segments", segments.len()));
    for seg in &segments {
        Output::segment_info(
            seg.index,
            seg.start_seconds,
            seg.end_seconds,
            seg.byte_size,
            seg.is_silence_aligned,
        );
    }

    let json = serde_json::to_string_pretty(&segments)?;
    match output {
        Some(out_path) => {
            std::fs::write(&out_path, &json)?;
            Output::success(&format!("Segment plan written to {}", out_path));
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
