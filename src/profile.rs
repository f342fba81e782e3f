//! Segmentation profile: the validated configuration value that governs
//! both the VAD and the chunk planner.
//!
//! Bundling VAD knobs and chunking knobs into one profile mirrors how they
//! are tuned in practice: a looser VAD threshold produces choppier
//! timelines, which in turn changes how often the planner has to force-split.
//! A `SegmentationProfile` can only be constructed through [`SegmentationProfile::new`]
//! (or [`SegmentationProfile::default`], which is itself always valid) — there is
//! no way to hand the planner an out-of-bounds profile.

use crate::error::CondenseError;

/// Hard ceiling for any chunk's reconstructed duration, in seconds.
pub const MAX_CHUNK_S_RANGE: (f64, f64) = (10.0, 300.0);
/// Threshold above which natural splits become eligible, in seconds.
pub const CHUNK_SEARCH_START_S_RANGE: (f64, f64) = (5.0, 60.0);
/// Minimum silence-gap duration qualifying as a natural split point, in seconds.
pub const MIN_GAP_FOR_SPLIT_S_RANGE: (f64, f64) = (0.5, 10.0);
/// Silence padding added at the start and end of each rendered chunk, in seconds.
pub const BOUNDARY_MARGIN_S_RANGE: (f64, f64) = (0.0, 1.0);
/// Per-gap cap on silence preserved inside a chunk, in seconds.
pub const MAX_INTRA_GAP_S_RANGE: (f64, f64) = (0.0, 5.0);

/// The safety backoff subtracted from `max_chunk_s` when the force-split
/// routine picks a target duration to aim for. Additive, not multiplicative,
/// per design: scaling it with `max_chunk_s` would make force-split behavior
/// diverge from the reference implementation for small ceilings.
pub const FORCE_SPLIT_BACKOFF_S: f64 = 2.0;

/// Configuration governing voice activity detection and chunk planning.
///
/// Every field is validated at construction time; an invalid profile never
/// reaches the planner or the VAD adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationProfile {
    // Chunking knobs (spec.md §3).
    pub max_chunk_s: f64,
    pub chunk_search_start_s: f64,
    pub min_gap_for_split_s: f64,
    pub boundary_margin_s: f64,
    pub max_intra_gap_s: f64,

    // VAD knobs.
    pub threshold: f32,
    pub min_silence_ms: u32,
    pub min_speech_ms: u32,
    pub speech_pad_ms: u32,
    pub sample_rate: u32,
}

impl Default for SegmentationProfile {
    fn default() -> Self {
        Self {
            max_chunk_s: 60.0,
            chunk_search_start_s: 30.0,
            min_gap_for_split_s: 3.0,
            boundary_margin_s: 0.30,
            max_intra_gap_s: 0.8,
            threshold: 0.5,
            min_silence_ms: 500,
            min_speech_ms: 250,
            speech_pad_ms: 250,
            sample_rate: 16_000,
        }
    }
}

fn in_range(value: f64, range: (f64, f64)) -> bool {
    value >= range.0 && value <= range.1
}

impl SegmentationProfile {
    /// Build a profile from explicit values, validating every field and the
    /// `chunk_search_start_s < max_chunk_s` cross-field constraint.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_chunk_s: f64,
        chunk_search_start_s: f64,
        min_gap_for_split_s: f64,
        boundary_margin_s: f64,
        max_intra_gap_s: f64,
        threshold: f32,
        min_silence_ms: u32,
        min_speech_ms: u32,
        speech_pad_ms: u32,
        sample_rate: u32,
    ) -> crate::error::Result<Self> {
        let profile = Self {
            max_chunk_s,
            chunk_search_start_s,
            min_gap_for_split_s,
            boundary_margin_s,
            max_intra_gap_s,
            threshold,
            min_silence_ms,
            min_speech_ms,
            speech_pad_ms,
            sample_rate,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Start from the defaults and override individual fields, re-validating
    /// the result. This is the ergonomic entry point for callers that only
    /// want to tweak a couple of knobs.
    pub fn builder() -> SegmentationProfileBuilder {
        SegmentationProfileBuilder(Self::default())
    }

    fn validate(&self) -> crate::error::Result<()> {
        if !in_range(self.max_chunk_s, MAX_CHUNK_S_RANGE) {
            return Err(CondenseError::configuration(
                "max_chunk_s",
                format!(
                    "{} is outside the allowed range {:?}",
                    self.max_chunk_s, MAX_CHUNK_S_RANGE
                ),
            ));
        }
        if !in_range(self.chunk_search_start_s, CHUNK_SEARCH_START_S_RANGE) {
            return Err(CondenseError::configuration(
                "chunk_search_start_s",
                format!(
                    "{} is outside the allowed range {:?}",
                    self.chunk_search_start_s, CHUNK_SEARCH_START_S_RANGE
                ),
            ));
        }
        if !in_range(self.min_gap_for_split_s, MIN_GAP_FOR_SPLIT_S_RANGE) {
            return Err(CondenseError::configuration(
                "min_gap_for_split_s",
                format!(
                    "{} is outside the allowed range {:?}",
                    self.min_gap_for_split_s, MIN_GAP_FOR_SPLIT_S_RANGE
                ),
            ));
        }
        if !in_range(self.boundary_margin_s, BOUNDARY_MARGIN_S_RANGE) {
            return Err(CondenseError::configuration(
                "boundary_margin_s",
                format!(
                    "{} is outside the allowed range {:?}",
                    self.boundary_margin_s, BOUNDARY_MARGIN_S_RANGE
                ),
            ));
        }
        if !in_range(self.max_intra_gap_s, MAX_INTRA_GAP_S_RANGE) {
            return Err(CondenseError::configuration(
                "max_intra_gap_s",
                format!(
                    "{} is outside the allowed range {:?}",
                    self.max_intra_gap_s, MAX_INTRA_GAP_S_RANGE
                ),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(CondenseError::configuration(
                "threshold",
                format!("{} must satisfy 0 < threshold < 1", self.threshold),
            ));
        }
        if self.sample_rate == 0 {
            return Err(CondenseError::configuration(
                "sample_rate",
                "sample_rate must be positive",
            ));
        }
        if self.chunk_search_start_s >= self.max_chunk_s {
            return Err(CondenseError::configuration(
                "chunk_search_start_s",
                format!(
                    "chunk_search_start_s ({}) must be less than max_chunk_s ({})",
                    self.chunk_search_start_s, self.max_chunk_s
                ),
            ));
        }
        Ok(())
    }

    /// Hash of the VAD-relevant fields, used to key the sidecar cache
    /// filename so a cache computed under one profile is never silently
    /// reused under a different one.
    pub fn vad_cache_key(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.threshold.to_bits().hash(&mut hasher);
        self.min_silence_ms.hash(&mut hasher);
        self.min_speech_ms.hash(&mut hasher);
        self.speech_pad_ms.hash(&mut hasher);
        self.sample_rate.hash(&mut hasher);
        hasher.finish()
    }
}

/// Builder that starts from [`SegmentationProfile::default`] and validates
/// on [`build`](Self::build).
pub struct SegmentationProfileBuilder(SegmentationProfile);

impl SegmentationProfileBuilder {
    pub fn max_chunk_s(mut self, v: f64) -> Self {
        self.0.max_chunk_s = v;
        self
    }

    pub fn chunk_search_start_s(mut self, v: f64) -> Self {
        self.0.chunk_search_start_s = v;
        self
    }

    pub fn min_gap_for_split_s(mut self, v: f64) -> Self {
        self.0.min_gap_for_split_s = v;
        self
    }

    pub fn boundary_margin_s(mut self, v: f64) -> Self {
        self.0.boundary_margin_s = v;
        self
    }

    pub fn max_intra_gap_s(mut self, v: f64) -> Self {
        self.0.max_intra_gap_s = v;
        self
    }

    pub fn threshold(mut self, v: f32) -> Self {
        self.0.threshold = v;
        self
    }

    pub fn min_silence_ms(mut self, v: u32) -> Self {
        self.0.min_silence_ms = v;
        self
    }

    pub fn min_speech_ms(mut self, v: u32) -> Self {
        self.0.min_speech_ms = v;
        self
    }

    pub fn speech_pad_ms(mut self, v: u32) -> Self {
        self.0.speech_pad_ms = v;
        self
    }

    pub fn sample_rate(mut self, v: u32) -> Self {
        self.0.sample_rate = v;
        self
    }

    pub fn build(self) -> crate::error::Result<SegmentationProfile> {
        self.0.validate()?;
        Ok(self.0)
    }
}
