//! Audio condensation core: strips silence from speech recordings and
//! splits the result into duration-bounded chunks suitable for handing to
//! a downstream transcription engine.
//!
//! The pipeline is decode → detect speech → plan chunks → render, each
//! stage its own module under [`audio`]. [`pipeline::condense`] wires all
//! four together; [`audio::planner::plan`] is the one piece of pure,
//! side-effect-free logic and can be exercised directly against a
//! hand-built [`audio::SpeechTimeline`] without touching a real file.

pub mod audio;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod verbose;

// Re-export audio types
pub use audio::{
    plan, render, select_decoder, AudioDecoder, ChunkPlan, FfmpegDecoder, PlannedChunk,
    RenderedChunk, SileroVad, SilenceGap, SpeechInterval, SpeechTimeline, TrimSpan,
    VoiceActivityDetection, WavDecoder,
};

// Re-export other utility types
pub use error::{CondenseError, Result};
pub use pipeline::{condense, ArtifactPolicy};
pub use profile::SegmentationProfile;
pub use verbose::set_verbose;
