//! Unified error type for the condensation core.
//!
//! Every failure mode named in the design (configuration, decode/render
//! subprocess failures, missing speech, unsplittable segments, missing
//! external tooling) is a variant here. No variant is ever raised to
//! signal anything but a genuine failure — the planner in particular
//! never uses an error for flow control.

use std::path::PathBuf;

/// Top-level error type for condensation-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CondenseError {
    /// A `SegmentationProfile` field was out of its declared bound, or a
    /// cross-field constraint (`chunk_search_start_s < max_chunk_s`) failed.
    #[error("configuration error: {field}: {message}")]
    Configuration { field: String, message: String },

    /// An external decoder/renderer subprocess failed, or the source file
    /// was unreadable.
    #[error("audio decode error during {stage} for {}: {message}", input.display())]
    AudioDecode {
        stage: &'static str,
        input: PathBuf,
        exit_code: Option<i32>,
        message: String,
    },

    /// The VAD found no voiced region in the input.
    #[error("no speech detected in {}", input.display())]
    NoSpeechDetected { input: PathBuf },

    /// A single voiced interval already exceeds `max_chunk_s` and cannot be
    /// split any further.
    #[error(
        "segment {start_s:.1}s-{end_s:.1}s exceeds max_chunk_s ({max_chunk_s:.1}s) and cannot be split"
    )]
    UnsplittableSegment {
        start_s: f64,
        end_s: f64,
        max_chunk_s: f64,
    },

    /// A required external binary is not on `PATH`.
    #[error("required dependency not found: {binary}")]
    DependencyMissing { binary: &'static str },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CondenseError {
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Actionable remediation strings for this error, suitable for
    /// surfacing to a user alongside the `Display` message.
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Configuration { .. } => {
                vec!["check the field's documented bounds on SegmentationProfile"]
            }
            Self::AudioDecode { .. } => vec![
                "verify the input file is a readable audio file",
                "try converting the file to WAV first: ffmpeg -i input.ext output.wav",
            ],
            Self::NoSpeechDetected { .. } => vec![
                "audio may be silent or very quiet; check recording levels",
                "lower the VAD threshold in the segmentation profile",
            ],
            Self::UnsplittableSegment { .. } => vec![
                "lower min_silence_ms so the VAD reports more, shorter intervals",
                "raise max_chunk_s if the downstream engine supports longer input",
            ],
            Self::DependencyMissing { binary } if *binary == "ffmpeg" => vec![
                "install ffmpeg: apt install ffmpeg (Debian/Ubuntu)",
                "or: brew install ffmpeg (macOS)",
            ],
            Self::DependencyMissing { .. } => {
                vec!["install the missing binary and ensure it is on PATH"]
            }
            Self::Io(_) => vec![],
        }
    }
}

/// Convenience result type using `CondenseError`.
pub type Result<T> = std::result::Result<T, CondenseError>;
