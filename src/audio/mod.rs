//! Audio condensation: decode, detect speech, plan chunks, render.

pub mod decoder;
pub mod planner;
pub mod renderer;
pub mod timeline;
pub mod vad;

pub use decoder::{select_decoder, AudioDecoder, FfmpegDecoder, WavDecoder};
pub use planner::{plan, ChunkPlan, PlannedChunk};
pub use renderer::{render, RenderedChunk, TrimSpan};
pub use timeline::{SilenceGap, SpeechInterval, SpeechTimeline};
pub use vad::{SileroVad, VoiceActivityDetection};
