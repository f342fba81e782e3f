//! Rendering a [`ChunkPlan`] into output WAV files via ffmpeg's concat
//! demuxer.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::audio::decoder::get_duration_seconds;
use crate::audio::planner::ChunkPlan;
use crate::audio::timeline::SpeechInterval;
use crate::error::{CondenseError, Result};
use crate::profile::SegmentationProfile;
use crate::{info, warn};

/// One rendered output chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChunk {
    pub path: PathBuf,
    pub duration_s: f64,
}

/// One `inpoint`/`outpoint` trim instruction against the source file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimSpan {
    pub start_s: f64,
    pub end_s: f64,
}

/// Compute the trim spans for one chunk's worth of speech intervals.
///
/// This is the exact boundary arithmetic from the reference condenser,
/// factored out so it can be tested without a real ffmpeg invocation:
/// - the first interval's start is pulled back by `boundary_margin_s`
///   (never before 0), every other interval's start snaps to the previous
///   span's end (so spans never overlap even if the source had jitter);
/// - every interval but the last has its end pushed forward by the gap to
///   the next interval's start, capped at `max_intra_gap_s`; the last
///   interval's end is pushed forward by `boundary_margin_s`;
/// - every end is clamped to `total_duration_s`;
/// - spans that collapse to zero or negative width are dropped.
pub fn compute_trim_spans(
    intervals: &[SpeechInterval],
    profile: &SegmentationProfile,
    total_duration_s: f64,
) -> Vec<TrimSpan> {
    let mut spans = Vec::with_capacity(intervals.len());
    let mut previous_end: Option<f64> = None;

    for (i, interval) in intervals.iter().enumerate() {
        let start = match previous_end {
            None => (interval.start_s - profile.boundary_margin_s).max(0.0),
            Some(prev_end) => interval.start_s.max(prev_end),
        };

        let mut end = if i + 1 < intervals.len() {
            let next_start = intervals[i + 1].start_s;
            interval.end_s + (next_start - interval.end_s).min(profile.max_intra_gap_s)
        } else {
            interval.end_s + profile.boundary_margin_s
        };
        end = end.min(total_duration_s);

        if start >= end {
            warn!("dropping degenerate trim span [{start}, {end})");
            continue;
        }

        previous_end = Some(end);
        spans.push(TrimSpan { start_s: start, end_s: end });
    }

    spans
}

/// Render every chunk in `plan` from `source_wav` into `output_dir`.
///
/// Output file naming follows the single/multi-chunk convention: a lone
/// chunk is named `{stem}_condensed.wav`; multiple chunks are named
/// `{stem}_condensed_part_{NNN}.wav`, 1-indexed, zero-padded to three
/// digits.
pub fn render(
    source_wav: &Path,
    plan: &ChunkPlan,
    profile: &SegmentationProfile,
    output_dir: &Path,
) -> Result<Vec<RenderedChunk>> {
    let total_duration_s = get_duration_seconds(source_wav)?;
    let stem = source_wav
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    std::fs::create_dir_all(output_dir)?;

    let mut rendered = Vec::with_capacity(plan.len());
    for (i, chunk) in plan.chunks.iter().enumerate() {
        let output_name = if plan.len() == 1 {
            format!("{stem}_condensed.wav")
        } else {
            format!("{stem}_condensed_part_{:03}.wav", i + 1)
        };
        let output_path = output_dir.join(output_name);

        match render_one_chunk(source_wav, &chunk.intervals, profile, total_duration_s, &output_path) {
            Ok(rendered_chunk) => rendered.push(rendered_chunk),
            Err(e) => {
                let _ = std::fs::remove_file(&output_path);
                return Err(e);
            }
        }
    }

    info!("rendered {} chunk(s) to {}", rendered.len(), output_dir.display());
    Ok(rendered)
}

/// Build the concat-demuxer render `Command` without running it. Exposed
/// for the same reason as `FfmpegDecoder::build_command`: a caller that
/// needs to cancel a long-running render can spawn it themselves and hold
/// the resulting `Child` instead of going through the blocking
/// `render`/`render_one_chunk`, which only ever call `.output()`.
pub fn build_command(concat_list: &Path, output_path: &Path) -> Command {
    let mut command = Command::new("ffmpeg");
    command
        .args(["-nostdin", "-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(concat_list)
        .args(["-ar", "16000", "-ac", "1", "-acodec", "pcm_s16le"])
        .arg(output_path);
    command
}

fn render_one_chunk(
    source_wav: &Path,
    intervals: &[SpeechInterval],
    profile: &SegmentationProfile,
    total_duration_s: f64,
    output_path: &Path,
) -> Result<RenderedChunk> {
    let spans = compute_trim_spans(intervals, profile, total_duration_s);
    if spans.is_empty() {
        return Err(CondenseError::AudioDecode {
            stage: "render",
            input: source_wav.to_path_buf(),
            exit_code: None,
            message: "no non-degenerate trim spans for this chunk".to_string(),
        });
    }

    let concat_list = write_concat_list(source_wav, &spans)?;

    let output = build_command(concat_list.path(), output_path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CondenseError::DependencyMissing { binary: "ffmpeg" }
            } else {
                CondenseError::Io(e)
            }
        })?;

    if !output.status.success() {
        return Err(CondenseError::AudioDecode {
            stage: "render",
            input: source_wav.to_path_buf(),
            exit_code: output.status.code(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let duration_s = get_duration_seconds(output_path)?;
    Ok(RenderedChunk {
        path: output_path.to_path_buf(),
        duration_s,
    })
}

fn write_concat_list(source_wav: &Path, spans: &[TrimSpan]) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("voxcondense_concat_")
        .suffix(".txt")
        .tempfile()?;

    let absolute_source = std::fs::canonicalize(source_wav).unwrap_or_else(|_| source_wav.to_path_buf());
    let escaped = absolute_source.display().to_string().replace('\'', "'\\''");

    for span in spans {
        writeln!(file, "file '{escaped}'")?;
        writeln!(file, "inpoint {:.6}", span.start_s)?;
        writeln!(file, "outpoint {:.6}", span.end_s)?;
    }
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: f64, end: f64) -> SpeechInterval {
        SpeechInterval::new(start, end)
    }

    #[test]
    fn single_interval_gets_both_margins() {
        let profile = SegmentationProfile::default();
        let spans = compute_trim_spans(&[iv(5.0, 10.0)], &profile, 100.0);
        assert_eq!(spans.len(), 1);
        assert!((spans[0].start_s - 4.7).abs() < 1e-9);
        assert!((spans[0].end_s - 10.3).abs() < 1e-9);
    }

    #[test]
    fn first_interval_margin_clamped_to_zero() {
        let profile = SegmentationProfile::default();
        let spans = compute_trim_spans(&[iv(0.1, 5.0)], &profile, 100.0);
        assert_eq!(spans[0].start_s, 0.0);
    }

    #[test]
    fn intra_gap_capped_between_intervals() {
        let profile = SegmentationProfile::default(); // max_intra_gap_s = 0.8
        let spans = compute_trim_spans(&[iv(0.0, 10.0), iv(15.0, 20.0)], &profile, 100.0);
        assert_eq!(spans.len(), 2);
        // First span's end is pushed forward by at most max_intra_gap_s.
        assert!((spans[0].end_s - 10.8).abs() < 1e-9);
        // Second span starts exactly where the first ended (no overlap, no gap left open).
        assert_eq!(spans[1].start_s, spans[0].end_s);
    }

    #[test]
    fn end_clamped_to_total_duration() {
        let profile = SegmentationProfile::default();
        let spans = compute_trim_spans(&[iv(95.0, 99.9)], &profile, 100.0);
        assert_eq!(spans[0].end_s, 100.0);
    }

    #[test]
    fn degenerate_span_is_dropped() {
        let profile = SegmentationProfile::default();
        // Interval lies entirely past total_duration_s: after clamping the
        // end to the audio's actual length, start ends up past it too.
        let spans = compute_trim_spans(&[iv(150.0, 160.0)], &profile, 100.0);
        assert!(spans.is_empty());
    }
}
