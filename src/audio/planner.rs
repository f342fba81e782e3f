//! Chunk planner: turns a [`SpeechTimeline`] into a [`ChunkPlan`] of
//! speech-interval groups, each of which reconstructs to no more than
//! `max_chunk_s` seconds.
//!
//! The planner is a pure function — no I/O, no subprocess, no clock. Given
//! the same timeline and profile it always produces the same plan, which is
//! what makes it independently testable against the scenarios below without
//! touching a real audio file.

use crate::audio::timeline::{SilenceGap, SpeechInterval, SpeechTimeline};
use crate::error::{CondenseError, Result};
use crate::profile::{SegmentationProfile, FORCE_SPLIT_BACKOFF_S};
use crate::{info, verbose};

/// One planned chunk: the speech intervals it contains, in source order,
/// and their precomputed reconstructed duration — the renderer and any
/// caller diagnostics need `D`, and the planner has already computed it
/// while deciding where to split, so there's no reason to make either
/// recompute it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChunk {
    pub intervals: Vec<SpeechInterval>,
    pub duration_s: f64,
}

/// A plan for rendering one or more output chunks from a speech timeline.
///
/// `split_indices` are the global timeline indices after which a split
/// occurred, in order; `chunks.len() == split_indices.len() + 1`. Both are
/// kept on the plan because a caller may want to report split points
/// without re-deriving them from chunk boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    pub chunks: Vec<PlannedChunk>,
    pub split_indices: Vec<usize>,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Plan how to split `timeline` into chunks under `profile`'s limits.
///
/// An empty timeline produces an empty plan — the planner does not decide
/// whether "no speech" is fatal; that policy belongs to the caller (see
/// [`crate::pipeline::condense`], which turns an empty plan into
/// [`CondenseError::NoSpeechDetected`]). Fails with
/// [`CondenseError::UnsplittableSegment`] if a single voiced interval alone
/// already exceeds `max_chunk_s`.
pub fn plan(timeline: &SpeechTimeline, profile: &SegmentationProfile) -> Result<ChunkPlan> {
    if timeline.is_empty() {
        return Ok(ChunkPlan { chunks: Vec::new(), split_indices: Vec::new() });
    }

    let split_indices = find_split_points(timeline, profile)?;
    let grouped = split_timestamps_into_chunks(timeline.as_slice(), &split_indices);
    let chunks: Vec<PlannedChunk> = grouped
        .into_iter()
        .map(|intervals| {
            let duration_s = SpeechTimeline::chunk_duration(&intervals, profile);
            PlannedChunk { intervals, duration_s }
        })
        .collect();

    info!(
        "planned {} chunk(s) from {} speech interval(s), {} split point(s), durations={:?}",
        chunks.len(),
        timeline.len(),
        split_indices.len(),
        chunks.iter().map(|c| c.duration_s).collect::<Vec<_>>()
    );

    Ok(ChunkPlan { chunks, split_indices })
}

/// Global indices into `timeline` at which to end a chunk (inclusive).
fn find_split_points(timeline: &SpeechTimeline, profile: &SegmentationProfile) -> Result<Vec<usize>> {
    let segments = timeline.as_slice();
    let gaps = timeline.silence_gaps();
    let mut split_indices = Vec::new();
    let mut current_chunk_start_idx = 0usize;

    while current_chunk_start_idx < segments.len() {
        let mut looking_for_split = false;
        let mut split_here: Option<usize> = None;

        for i in current_chunk_start_idx..segments.len() {
            let window = &segments[current_chunk_start_idx..=i];
            let chunk_duration = SpeechTimeline::chunk_duration(window, profile);

            if chunk_duration >= profile.chunk_search_start_s {
                looking_for_split = true;
            }

            if looking_for_split && i < gaps.len() {
                let gap: SilenceGap = gaps[i];
                if gap.duration_s >= profile.min_gap_for_split_s {
                    verbose!(
                        "natural split after index {} (gap {:.2}s >= {:.2}s)",
                        i,
                        gap.duration_s,
                        profile.min_gap_for_split_s
                    );
                    split_here = Some(i);
                    break;
                }
            }

            if chunk_duration >= profile.max_chunk_s {
                let force_idx = find_force_split_location(
                    segments,
                    current_chunk_start_idx,
                    i,
                    profile,
                )?;
                verbose!(
                    "force split after index {} (chunk duration {:.2}s >= {:.2}s)",
                    force_idx,
                    chunk_duration,
                    profile.max_chunk_s
                );
                split_here = Some(force_idx);
                break;
            }
        }

        match split_here {
            Some(idx) => {
                split_indices.push(idx);
                current_chunk_start_idx = idx + 1;
            }
            None => break,
        }
    }

    Ok(split_indices)
}

/// Backwards-scan within `segments[chunk_start_idx..=chunk_end_idx]` for the
/// split point whose prefix duration is closest to `max_chunk_s -
/// FORCE_SPLIT_BACKOFF_S` without exceeding `max_chunk_s`. Returns a global
/// index.
fn find_force_split_location(
    segments: &[SpeechInterval],
    chunk_start_idx: usize,
    chunk_end_idx: usize,
    profile: &SegmentationProfile,
) -> Result<usize> {
    let chunk_segments = &segments[chunk_start_idx..=chunk_end_idx];

    if chunk_segments.len() == 1 {
        let single = chunk_segments[0];
        let single_duration =
            SpeechTimeline::chunk_duration(chunk_segments, profile);
        if single_duration > profile.max_chunk_s {
            return Err(CondenseError::UnsplittableSegment {
                start_s: single.start_s,
                end_s: single.end_s,
                max_chunk_s: profile.max_chunk_s,
            });
        }
        return Ok(chunk_start_idx);
    }

    let target_duration = profile.max_chunk_s - FORCE_SPLIT_BACKOFF_S;
    let mut best_idx: Option<usize> = None;
    let mut best_distance = f64::INFINITY;

    for local_idx in (0..chunk_segments.len()).rev() {
        let prefix = &chunk_segments[..=local_idx];
        let test_duration = SpeechTimeline::chunk_duration(prefix, profile);
        if test_duration > profile.max_chunk_s {
            continue;
        }
        let distance = (test_duration - target_duration).abs();
        if distance < best_distance {
            best_distance = distance;
            best_idx = Some(local_idx);
        }
    }

    match best_idx {
        Some(local_idx) => Ok(chunk_start_idx + local_idx),
        None => {
            let first = chunk_segments.first().unwrap();
            let last = chunk_segments.last().unwrap();
            Err(CondenseError::UnsplittableSegment {
                start_s: first.start_s,
                end_s: last.end_s,
                max_chunk_s: profile.max_chunk_s,
            })
        }
    }
}

/// Split `timestamps` into chunks at each index in `split_indices`
/// (inclusive of the split index), appending any remainder as a final
/// chunk.
fn split_timestamps_into_chunks(
    timestamps: &[SpeechInterval],
    split_indices: &[usize],
) -> Vec<Vec<SpeechInterval>> {
    if split_indices.is_empty() {
        return vec![timestamps.to_vec()];
    }

    let mut chunks = Vec::with_capacity(split_indices.len() + 1);
    let mut start_idx = 0usize;
    for &split_idx in split_indices {
        chunks.push(timestamps[start_idx..=split_idx].to_vec());
        start_idx = split_idx + 1;
    }
    if start_idx < timestamps.len() {
        chunks.push(timestamps[start_idx..].to_vec());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: f64, end: f64) -> SpeechInterval {
        SpeechInterval::new(start, end)
    }

    fn timeline(intervals: Vec<SpeechInterval>) -> SpeechTimeline {
        SpeechTimeline::new(intervals)
    }

    /// Build a timeline from a first interval duration plus a list of
    /// `(gap_duration, next_interval_duration)` pairs, injecting each gap
    /// between consecutive intervals. The inverse of
    /// `SpeechTimeline::silence_gaps`.
    fn inject_gaps(first_duration: f64, rest: &[(f64, f64)]) -> SpeechTimeline {
        let mut intervals = vec![iv(0.0, first_duration)];
        let mut cursor = first_duration;
        for &(gap, duration) in rest {
            let start = cursor + gap;
            intervals.push(iv(start, start + duration));
            cursor = start + duration;
        }
        timeline(intervals)
    }

    #[test]
    fn silence_gaps_round_trips_through_inject_gaps() {
        let injected = [(2.0, 5.0), (0.0, 3.0), (4.5, 1.0)];
        let tl = inject_gaps(10.0, &injected);
        let gaps = tl.silence_gaps();

        assert_eq!(gaps.len(), injected.len());
        for (i, (gap, _duration)) in injected.iter().enumerate() {
            assert_eq!(gaps[i].after_index, i);
            assert!((gaps[i].duration_s - gap).abs() < 1e-9);
        }
    }

    #[test]
    fn silence_gaps_round_trips_with_touching_interval_normalized_to_zero() {
        // A zero-duration gap injected between touching intervals must come
        // back as a zero-duration gap, not a negative or missing one.
        let tl = inject_gaps(10.0, &[(0.0, 5.0)]);
        let gaps = tl.silence_gaps();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].duration_s, 0.0);
    }

    #[test]
    fn short_audio_under_search_start_has_no_splits() {
        let tl = timeline(vec![iv(0.0, 10.0)]);
        let profile = SegmentationProfile::default();
        let splits = find_split_points(&tl, &profile).unwrap();
        assert!(splits.is_empty());
    }

    #[test]
    fn natural_split_on_sufficient_gap() {
        let tl = timeline(vec![iv(0.0, 35.0), iv(38.5, 70.0)]);
        let profile = SegmentationProfile::default();
        let splits = find_split_points(&tl, &profile).unwrap();
        assert_eq!(splits, vec![0]);
    }

    #[test]
    fn no_split_needed_under_max_chunk() {
        let tl = timeline(vec![iv(0.0, 25.0), iv(26.0, 50.0)]);
        let profile = SegmentationProfile::default();
        let splits = find_split_points(&tl, &profile).unwrap();
        assert!(splits.is_empty());
    }

    #[test]
    fn force_split_keeps_all_chunks_under_max() {
        let tl = timeline(vec![
            iv(0.0, 20.0),
            iv(21.0, 41.0),
            iv(42.5, 62.5),
            iv(64.0, 84.0),
        ]);
        let profile = SegmentationProfile::default();
        let plan_result = plan(&tl, &profile).unwrap();
        assert!(!plan_result.is_empty());
        for chunk in &plan_result.chunks {
            assert!(
                chunk.duration_s <= profile.max_chunk_s,
                "chunk duration {} exceeds max_chunk_s",
                chunk.duration_s
            );
        }
    }

    #[test]
    fn normal_speech_patterns_split_and_stay_under_max() {
        let tl = timeline(vec![
            iv(0.0, 20.0),
            iv(23.0, 43.0),
            iv(47.0, 67.0),
            iv(70.5, 90.5),
        ]);
        let profile = SegmentationProfile::default();
        let plan_result = plan(&tl, &profile).unwrap();
        assert!(plan_result.len() >= 1);
        for chunk in &plan_result.chunks {
            assert!(chunk.duration_s <= profile.max_chunk_s);
        }
    }

    #[test]
    fn dense_speech_first_valid_split_is_third_gap() {
        let tl = timeline(vec![
            iv(0.0, 20.0),
            iv(21.0, 40.0),
            iv(41.5, 60.0),
            iv(63.5, 82.0),
        ]);
        let profile = SegmentationProfile::default();
        let splits = find_split_points(&tl, &profile).unwrap();
        assert!(splits.contains(&2));
    }

    #[test]
    fn continuous_speech_forces_splits_under_max() {
        let tl = timeline(vec![
            iv(0.0, 20.0),
            iv(21.0, 41.0),
            iv(42.5, 62.5),
            iv(64.0, 84.0),
        ]);
        let profile = SegmentationProfile::default();
        let plan_result = plan(&tl, &profile).unwrap();
        for chunk in &plan_result.chunks {
            assert!(chunk.duration_s <= profile.max_chunk_s);
        }
    }

    #[test]
    fn choppy_vad_patterns_all_chunks_under_max() {
        let mut intervals = Vec::new();
        for i in 0..50u32 {
            let start = i as f64 * 1.5;
            intervals.push(iv(start, start + 1.0));
        }
        // Widen two gaps so the planner has natural split opportunities.
        let widen = |intervals: &mut Vec<SpeechInterval>, idx: usize, extra: f64| {
            for seg in intervals.iter_mut().skip(idx + 1) {
                seg.start_s += extra;
                seg.end_s += extra;
            }
        };
        widen(&mut intervals, 19, 3.2 - 0.5);
        widen(&mut intervals, 39, 4.0 - 0.5);

        let tl = timeline(intervals);
        let profile = SegmentationProfile::default();
        let plan_result = plan(&tl, &profile).unwrap();
        for chunk in &plan_result.chunks {
            assert!(chunk.duration_s <= profile.max_chunk_s);
        }
    }

    #[test]
    fn exactly_at_limit_has_no_splits() {
        let tl = timeline(vec![iv(0.0, 58.0)]);
        let profile = SegmentationProfile::default();
        let splits = find_split_points(&tl, &profile).unwrap();
        assert!(splits.is_empty());
        let d = SpeechTimeline::chunk_duration(tl.as_slice(), &profile);
        assert!(d <= profile.max_chunk_s);
    }

    #[test]
    fn single_segment_over_limit_is_unsplittable() {
        let tl = timeline(vec![iv(0.0, 62.0)]);
        let profile = SegmentationProfile::default();
        let err = plan(&tl, &profile).unwrap_err();
        match err {
            CondenseError::UnsplittableSegment { start_s, end_s, max_chunk_s } => {
                assert_eq!(start_s, 0.0);
                assert_eq!(end_s, 62.0);
                assert_eq!(max_chunk_s, 60.0);
            }
            other => panic!("expected UnsplittableSegment, got {other:?}"),
        }
    }

    #[test]
    fn unsplittable_segment_message_mentions_cannot_be_split() {
        let err = CondenseError::UnsplittableSegment {
            start_s: 0.0,
            end_s: 62.0,
            max_chunk_s: 60.0,
        };
        assert!(err.to_string().contains("cannot be split"));
    }

    #[test]
    fn two_segments_together_under_limit_has_no_splits() {
        let tl = timeline(vec![iv(0.0, 20.0), iv(21.0, 40.0)]);
        let profile = SegmentationProfile::default();
        let splits = find_split_points(&tl, &profile).unwrap();
        assert!(splits.is_empty());
    }

    #[test]
    fn split_timestamps_into_chunks_no_splits_returns_single_chunk() {
        let segs = vec![iv(0.0, 10.0), iv(12.0, 20.0)];
        let chunks = split_timestamps_into_chunks(&segs, &[]);
        assert_eq!(chunks, vec![segs]);
    }

    #[test]
    fn split_timestamps_into_chunks_splits_inclusive() {
        let segs = vec![iv(0.0, 10.0), iv(12.0, 20.0), iv(22.0, 30.0)];
        let chunks = split_timestamps_into_chunks(&segs, &[0]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], vec![segs[0]]);
        assert_eq!(chunks[1], vec![segs[1], segs[2]]);
    }

    #[test]
    fn empty_timeline_produces_empty_plan() {
        let tl = timeline(vec![]);
        let profile = SegmentationProfile::default();
        let plan_result = plan(&tl, &profile).unwrap();
        assert!(plan_result.is_empty());
        assert!(plan_result.split_indices.is_empty());
    }
}
