//! Top-level orchestration: decode → detect speech → plan chunks → render.

use std::path::Path;

use crate::audio::decoder::{get_duration_seconds, select_decoder, temp_wav_path};
use crate::audio::vad::{load_cached_timeline, store_cached_timeline, SileroVad, VoiceActivityDetection};
use crate::audio::{planner, renderer, RenderedChunk};
use crate::error::Result;
use crate::profile::SegmentationProfile;
use crate::{info, verbose};

/// Governs what happens to intermediate artifacts (the normalized decode
/// WAV) once a run finishes.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactPolicy {
    /// Delete the intermediate decode WAV once rendering succeeds.
    pub cleanup_on_success: bool,
    /// Keep the intermediate decode WAV around for inspection when the run
    /// fails partway through.
    pub keep_on_error: bool,
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self {
            cleanup_on_success: true,
            keep_on_error: true,
        }
    }
}

/// Run the full condensation pipeline over `source` and write the resulting
/// chunks into `output_dir`.
///
/// Decoding normalizes `source` to 16 kHz mono PCM WAV; detection runs the
/// VAD (or reuses its sidecar cache); planning groups the detected speech
/// into chunks under `profile`'s limits; rendering trims and concatenates
/// each chunk's speech intervals into its own output WAV.
pub fn condense(
    source: &Path,
    profile: &SegmentationProfile,
    output_dir: &Path,
    artifact_policy: &ArtifactPolicy,
) -> Result<Vec<RenderedChunk>> {
    info!("condensing {}", source.display());

    let decode_wav = temp_wav_path("decode");
    let decoder = select_decoder(source);
    decoder.decode_to_wav(source, &decode_wav)?;
    verbose!("decoded to {}", decode_wav.display());

    let result = condense_decoded(&decode_wav, profile, output_dir);

    match &result {
        Ok(_) if artifact_policy.cleanup_on_success => {
            let _ = std::fs::remove_file(&decode_wav);
        }
        Err(_) if !artifact_policy.keep_on_error => {
            let _ = std::fs::remove_file(&decode_wav);
        }
        _ => {}
    }

    result
}

fn condense_decoded(
    decode_wav: &Path,
    profile: &SegmentationProfile,
    output_dir: &Path,
) -> Result<Vec<RenderedChunk>> {
    let cache_key = profile.vad_cache_key();
    let timeline = match load_cached_timeline(decode_wav, cache_key) {
        Some(timeline) => {
            verbose!("using cached VAD timeline");
            timeline
        }
        None => {
            let duration_s = get_duration_seconds(decode_wav)?;
            let mut reader = hound::WavReader::open(decode_wav).map_err(|e| {
                crate::error::CondenseError::AudioDecode {
                    stage: "probe",
                    input: decode_wav.to_path_buf(),
                    exit_code: None,
                    message: e.to_string(),
                }
            })?;
            let sample_rate = reader.spec().sample_rate;
            let samples: Vec<f32> = reader
                .samples::<i16>()
                .map(|s| s.unwrap_or(0) as f32 / i16::MAX as f32)
                .collect();
            verbose!("running VAD over {:.1}s of audio", duration_s);

            let timeline = SileroVad::new().detect(&samples, sample_rate, profile)?;
            store_cached_timeline(decode_wav, cache_key, &timeline)?;
            timeline
        }
    };

    let plan = planner::plan(&timeline, profile)?;
    if plan.is_empty() {
        return Err(crate::error::CondenseError::NoSpeechDetected {
            input: decode_wav.to_path_buf(),
        });
    }
    renderer::render(decode_wav, &plan, profile, output_dir)
}
