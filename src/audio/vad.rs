//! Voice activity detection: turns decoded PCM samples into a
//! [`SpeechTimeline`], with a JSON sidecar cache so repeated runs over the
//! same file under the same profile skip the model entirely.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use voice_activity_detector::VoiceActivityDetector;

use crate::audio::timeline::{SpeechInterval, SpeechTimeline};
use crate::error::{CondenseError, Result};
use crate::profile::SegmentationProfile;
use crate::{info, verbose};

/// VAD processes this many samples per inference call.
const VAD_CHUNK_SIZE: usize = 512;

/// Detects speech intervals in a decoded audio stream.
pub trait VoiceActivityDetection {
    fn detect(&self, samples: &[f32], sample_rate: u32, profile: &SegmentationProfile) -> Result<SpeechTimeline>;
}

/// Silero VAD, wrapped to emit a [`SpeechTimeline`] instead of raw
/// per-frame probabilities.
///
/// Detection runs in two passes over the per-chunk speech/silence
/// classification: merge adjacent speech runs separated by gaps shorter
/// than `min_silence_ms` (so a short breath doesn't split one utterance
/// into two), then drop whatever remains that is shorter than
/// `min_speech_ms` (so isolated noise blips don't become their own
/// intervals). Interval boundaries are padded outward by `speech_pad_ms`,
/// clamped to the audio bounds.
pub struct SileroVad;

impl SileroVad {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SileroVad {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceActivityDetection for SileroVad {
    fn detect(&self, samples: &[f32], sample_rate: u32, profile: &SegmentationProfile) -> Result<SpeechTimeline> {
        let mut detector = VoiceActivityDetector::builder()
            .sample_rate(sample_rate as i64)
            .chunk_size(VAD_CHUNK_SIZE)
            .build()
            .map_err(|e| CondenseError::AudioDecode {
                stage: "vad-init",
                input: PathBuf::new(),
                exit_code: None,
                message: e.to_string(),
            })?;

        let mut raw_intervals: Vec<(usize, usize)> = Vec::new();
        let mut run_start: Option<usize> = None;

        let mut offset = 0usize;
        for chunk in samples.chunks(VAD_CHUNK_SIZE) {
            let probability = if chunk.len() == VAD_CHUNK_SIZE {
                detector.predict(chunk.iter().copied())
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(VAD_CHUNK_SIZE, 0.0);
                detector.predict(padded.into_iter())
            };
            let is_voice = probability >= profile.threshold;

            match (run_start, is_voice) {
                (None, true) => run_start = Some(offset),
                (Some(start), false) => {
                    raw_intervals.push((start, offset));
                    run_start = None;
                }
                _ => {}
            }
            offset += chunk.len();
        }
        if let Some(start) = run_start {
            raw_intervals.push((start, samples.len()));
        }

        verbose!("vad produced {} raw speech run(s)", raw_intervals.len());

        let sample_rate_f = sample_rate as f64;
        let pad_s = profile.speech_pad_ms as f64 / 1000.0;
        let min_silence_s = profile.min_silence_ms as f64 / 1000.0;
        let min_speech_s = profile.min_speech_ms as f64 / 1000.0;
        let total_duration_s = samples.len() as f64 / sample_rate_f;

        let mut merged: Vec<(f64, f64)> = Vec::new();
        for (start_samples, end_samples) in raw_intervals {
            let start_s = (start_samples as f64 / sample_rate_f - pad_s).max(0.0);
            let end_s = (end_samples as f64 / sample_rate_f + pad_s).min(total_duration_s);
            match merged.last_mut() {
                Some(last) if start_s - last.1 < min_silence_s => {
                    last.1 = last.1.max(end_s);
                }
                _ => merged.push((start_s, end_s)),
            }
        }

        let intervals: Vec<SpeechInterval> = merged
            .into_iter()
            .filter(|(start, end)| end - start > 0.0 && end - start >= min_speech_s)
            .map(|(start, end)| SpeechInterval::new(start, end))
            .collect();

        info!("vad detected {} speech interval(s) after merging", intervals.len());

        Ok(SpeechTimeline::new(intervals))
    }
}

/// One cached speech interval, serialized as `{"start": f64, "end": f64}`.
#[derive(Debug, Serialize, Deserialize)]
struct CachedInterval {
    start: f64,
    end: f64,
}

/// Sidecar cache file path for `audio_path` under the given cache key.
///
/// The cache is a bare top-level JSON array of `CachedInterval`; staleness
/// is tracked entirely by the key embedded in the filename, not by any
/// field inside the file itself.
pub fn cache_path_for(audio_path: &Path, cache_key: u64) -> PathBuf {
    let stem = audio_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let dir = audio_path.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{stem}.vad-{cache_key:x}.json"))
}

/// Load a cached timeline for `audio_path`, returning `None` on a cache
/// miss (file absent, unreadable, or keyed to a different profile) rather
/// than an error — a cache miss is a normal, expected outcome.
pub fn load_cached_timeline(audio_path: &Path, cache_key: u64) -> Option<SpeechTimeline> {
    let path = cache_path_for(audio_path, cache_key);
    let contents = std::fs::read_to_string(&path).ok()?;
    let cached: Vec<CachedInterval> = serde_json::from_str(&contents).ok()?;
    let intervals = cached
        .into_iter()
        .map(|c| SpeechInterval::new(c.start, c.end))
        .collect();
    verbose!("loaded cached VAD timeline from {}", path.display());
    Some(SpeechTimeline::new(intervals))
}

/// Write `timeline` to the sidecar cache for `audio_path`. Failure to write
/// the cache is not fatal to the caller; it only means the next run redoes
/// the detection work.
pub fn store_cached_timeline(audio_path: &Path, cache_key: u64, timeline: &SpeechTimeline) -> Result<()> {
    let path = cache_path_for(audio_path, cache_key);
    let cached: Vec<CachedInterval> = timeline
        .as_slice()
        .iter()
        .map(|iv| CachedInterval { start: iv.start_s, end: iv.end_s })
        .collect();
    let contents = serde_json::to_string_pretty(&cached).map_err(|e| CondenseError::AudioDecode {
        stage: "vad-cache-write",
        input: audio_path.to_path_buf(),
        exit_code: None,
        message: e.to_string(),
    })?;
    std::fs::write(&path, contents)?;
    verbose!("wrote VAD cache to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_includes_stem_and_key() {
        let path = cache_path_for(Path::new("/tmp/recording.wav"), 0xdead_beef);
        assert_eq!(path, PathBuf::from("/tmp/recording.vad-deadbeef.json"));
    }

    #[test]
    fn cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("clip.wav");
        let timeline = SpeechTimeline::new(vec![SpeechInterval::new(0.0, 1.0), SpeechInterval::new(2.0, 3.0)]);

        store_cached_timeline(&audio_path, 42, &timeline).unwrap();
        let loaded = load_cached_timeline(&audio_path, 42).unwrap();
        assert_eq!(loaded, timeline);
    }

    #[test]
    fn cache_miss_on_wrong_key() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("clip.wav");
        let timeline = SpeechTimeline::new(vec![SpeechInterval::new(0.0, 1.0)]);
        store_cached_timeline(&audio_path, 42, &timeline).unwrap();
        assert!(load_cached_timeline(&audio_path, 43).is_none());
    }

    #[test]
    fn cache_miss_on_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("missing.wav");
        assert!(load_cached_timeline(&audio_path, 42).is_none());
    }
}
