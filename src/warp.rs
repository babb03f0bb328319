//! # Time Warping
//!
//! A warp moves the event boundaries of a bar without changing its overall
//! duration. The curve itself is not part of this crate: callers supply a
//! [`PositionWarp`] (an envelope evaluator, or any closure) and the voices are
//! rebuilt from the warped boundaries.
//!
//! Boundaries are shared: when two voices have an event starting at the same
//! position, both events are moved to the same warped position.

use std::collections::{BTreeSet, HashMap};

use crate::error::ScoreError;
use crate::voice::Voice;

/// Maps sorted boundary positions to warped positions.
///
/// Implementations must return one position per input, strictly ascending,
/// with the first and last positions unchanged.
pub trait PositionWarp {
    fn warp_positions(&self, positions_ms: &[u32], distortion: f64) -> Vec<u32>;
}

impl<F> PositionWarp for F
where
    F: Fn(&[u32], f64) -> Vec<u32>,
{
    fn warp_positions(&self, positions_ms: &[u32], distortion: f64) -> Vec<u32> {
        self(positions_ms, distortion)
    }
}

/// Leaves every position where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityWarp;

impl PositionWarp for IdentityWarp {
    fn warp_positions(&self, positions_ms: &[u32], _distortion: f64) -> Vec<u32> {
        positions_ms.to_vec()
    }
}

pub(crate) fn time_warp_voices<W: PositionWarp + ?Sized>(
    voices: &mut [Voice],
    duration_ms: u32,
    warp: &W,
    distortion: f64,
) -> Result<(), ScoreError> {
    let mut boundaries = BTreeSet::new();
    for voice in voices.iter() {
        let offset_ms = voice.track().position_ms_re_container();
        for event in voice.track().events() {
            boundaries.insert(offset_ms + event.position_ms());
        }
    }
    boundaries.insert(duration_ms);
    let originals: Vec<u32> = boundaries.into_iter().collect();

    let warped = warp.warp_positions(&originals, distortion);
    if warped.len() != originals.len() {
        return Err(ScoreError::ArgumentRange(format!(
            "warp returned {} positions for {} boundaries",
            warped.len(),
            originals.len()
        )));
    }
    if warped.first() != originals.first() || warped.last() != originals.last() {
        return Err(ScoreError::ArgumentRange(
            "warp must keep the first and last boundary in place".to_string(),
        ));
    }
    if warped.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(ScoreError::ArgumentRange(
            "warped boundaries must be strictly ascending".to_string(),
        ));
    }
    let moved: HashMap<u32, u32> = originals.iter().copied().zip(warped.iter().copied()).collect();

    for voice in voices.iter_mut() {
        let track = voice.track_mut();
        let offset_ms = track.position_ms_re_container();
        let mut durations = Vec::with_capacity(track.len());
        for event in track.events() {
            let start = offset_ms + event.position_ms();
            let end = offset_ms + event.end_ms();
            match (moved.get(&start), moved.get(&end)) {
                (Some(new_start), Some(new_end)) => durations.push(new_end - new_start),
                _ => {
                    return Err(ScoreError::invariant(
                        "time warp",
                        format!("no warped boundary for the {} at {}ms", event.kind(), start),
                    ));
                }
            }
        }
        let new_offset = moved.get(&offset_ms).copied().unwrap_or(offset_ms);
        track.set_position_ms_re_container(new_offset);
        track.set_event_durations(&durations);
    }
    Ok(())
}
