//! Decoding the source audio file into the canonical PCM WAV format the
//! rest of the pipeline assumes: 16 kHz, mono, 16-bit signed little-endian.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{CondenseError, Result};
use crate::verbose;

/// Canonical sample rate all decoded audio is normalized to.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Canonical channel count all decoded audio is normalized to.
pub const TARGET_CHANNELS: u16 = 1;

/// Decodes an arbitrary audio file into a canonical PCM WAV file on disk.
pub trait AudioDecoder {
    /// Decode `input` into a freshly-written WAV file at `output_wav`,
    /// resampled/remixed to [`TARGET_SAMPLE_RATE`]/[`TARGET_CHANNELS`].
    fn decode_to_wav(&self, input: &Path, output_wav: &Path) -> Result<()>;

    /// Whether this decoder can handle `input` without shelling out, based
    /// purely on its extension — used to pick the cheap path when available.
    fn supports_format(&self, input: &Path) -> bool;
}

/// Decodes via the `ffmpeg` CLI binary. Handles any input format ffmpeg
/// understands.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Confirm the `ffmpeg` binary is reachable on `PATH`.
    pub fn check_available() -> Result<()> {
        let found = Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(CondenseError::DependencyMissing { binary: "ffmpeg" })
        }
    }

    /// Build the decode `Command` without running it. Exposed so a caller
    /// that needs to cancel a long-running decode can spawn it themselves
    /// and hold the resulting `Child` instead of going through the
    /// blocking `decode_to_wav`, which only ever calls `.output()`.
    pub fn build_command(&self, input: &Path, output_wav: &Path) -> Command {
        let mut command = Command::new("ffmpeg");
        command
            .args(["-nostdin", "-y", "-i"])
            .arg(input)
            .args([
                "-ar",
                &TARGET_SAMPLE_RATE.to_string(),
                "-ac",
                &TARGET_CHANNELS.to_string(),
                "-acodec",
                "pcm_s16le",
            ])
            .arg(output_wav);
        command
    }
}

impl AudioDecoder for FfmpegDecoder {
    fn decode_to_wav(&self, input: &Path, output_wav: &Path) -> Result<()> {
        verbose!("decoding {} via ffmpeg", input.display());
        let output = self.build_command(input, output_wav).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CondenseError::DependencyMissing { binary: "ffmpeg" }
            } else {
                CondenseError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(CondenseError::AudioDecode {
                stage: "decode",
                input: input.to_path_buf(),
                exit_code: output.status.code(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn supports_format(&self, _input: &Path) -> bool {
        // ffmpeg is the fallback for anything the fast path can't handle.
        true
    }
}

/// Decodes WAV input directly via `hound`, skipping the ffmpeg subprocess
/// when the source is already in (or close to) the canonical format.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl WavDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for WavDecoder {
    fn decode_to_wav(&self, input: &Path, output_wav: &Path) -> Result<()> {
        verbose!("decoding {} via hound fast path", input.display());
        let mut reader = hound::WavReader::open(input).map_err(|e| CondenseError::AudioDecode {
            stage: "decode",
            input: input.to_path_buf(),
            exit_code: None,
            message: e.to_string(),
        })?;
        let spec = reader.spec();

        if spec.sample_rate == TARGET_SAMPLE_RATE
            && spec.channels == TARGET_CHANNELS
            && spec.bits_per_sample == 16
            && spec.sample_format == hound::SampleFormat::Int
        {
            std::fs::copy(input, output_wav)?;
            return Ok(());
        }

        // Input is WAV but not in canonical format: fall back to ffmpeg,
        // which already knows how to resample and remix.
        FfmpegDecoder::new().decode_to_wav(input, output_wav)
    }

    fn supports_format(&self, input: &Path) -> bool {
        matches!(
            input.extension().and_then(|e| e.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("wav")
        )
    }
}

/// Pick the cheapest decoder able to handle `input`.
pub fn select_decoder(input: &Path) -> Box<dyn AudioDecoder> {
    let wav = WavDecoder::new();
    if wav.supports_format(input) {
        Box::new(wav)
    } else {
        Box::new(FfmpegDecoder::new())
    }
}

/// Total duration of a canonical WAV file, in seconds, read from its
/// header. Reading the header is exact and instantaneous; shelling out to
/// `ffprobe` for this is deliberately avoided; a probe failure or a stalled
/// process would have to fall back to a sentinel duration, and any such
/// sentinel silently corrupts every downstream boundary calculation.
pub fn get_duration_seconds(wav_path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(wav_path).map_err(|e| CondenseError::AudioDecode {
        stage: "probe",
        input: wav_path.to_path_buf(),
        exit_code: None,
        message: e.to_string(),
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(CondenseError::AudioDecode {
            stage: "probe",
            input: wav_path.to_path_buf(),
            exit_code: None,
            message: "WAV header reports a zero sample rate".to_string(),
        });
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Unique temp file path for an intermediate decode artifact.
pub fn temp_wav_path(prefix: &str) -> PathBuf {
    let unique = format!(
        "{prefix}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default(),
    );
    std::env::temp_dir().join(format!("voxcondense_{unique}.wav"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f64) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (sample_rate as f64 * seconds) as u32 * channels as u32;
        for _ in 0..n {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn wav_decoder_supports_only_wav_extension() {
        let decoder = WavDecoder::new();
        assert!(decoder.supports_format(Path::new("foo.wav")));
        assert!(decoder.supports_format(Path::new("foo.WAV")));
        assert!(!decoder.supports_format(Path::new("foo.mp3")));
    }

    #[test]
    fn select_decoder_picks_wav_fast_path() {
        let decoder = select_decoder(Path::new("input.wav"));
        assert!(decoder.supports_format(Path::new("input.wav")));
    }

    #[test]
    fn canonical_wav_is_copied_without_reencoding() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        write_test_wav(&input, TARGET_SAMPLE_RATE, TARGET_CHANNELS, 1.0);

        WavDecoder::new().decode_to_wav(&input, &output).unwrap();
        assert!(output.exists());

        let duration = get_duration_seconds(&output).unwrap();
        assert!((duration - 1.0).abs() < 0.01);
    }

    #[test]
    fn duration_reads_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("sample.wav");
        write_test_wav(&wav, TARGET_SAMPLE_RATE, TARGET_CHANNELS, 2.5);
        let duration = get_duration_seconds(&wav).unwrap();
        assert!((duration - 2.5).abs() < 0.01);
    }
}
