//! # Track Groups
//!
//! Parallel tracks that share one event shape: the same number of events,
//! with a chord opposite every chord and a rest opposite every rest. Durations
//! and chord contents may differ from track to track.

use crate::error::ScoreError;
use crate::track::{SplitPolicy, Track};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackGroup {
    position_ms_re_container: u32,
    tracks: Vec<Track>,
}

impl TrackGroup {
    pub fn new(tracks: Vec<Track>) -> Result<Self, ScoreError> {
        if tracks.is_empty() {
            return Err(ScoreError::ArgumentRange(
                "a track group needs at least one track".to_string(),
            ));
        }
        let group = Self {
            position_ms_re_container: 0,
            tracks,
        };
        group.assert_consistency()?;
        Ok(group)
    }

    pub fn with_offset(mut self, position_ms_re_container: u32) -> Self {
        self.position_ms_re_container = position_ms_re_container;
        self
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    pub fn position_ms_re_container(&self) -> u32 {
        self.position_ms_re_container
    }

    /// Duration of the first track.
    pub fn duration_ms(&self) -> u32 {
        self.tracks.first().map_or(0, Track::duration_ms)
    }

    pub fn transpose(&mut self, semitones: i32) {
        for track in &mut self.tracks {
            track.transpose(semitones);
        }
    }

    /// Split the group at `duration_ms` of its first track.
    ///
    /// The first track is cut by duration, which decides how many events go
    /// into the popped group. Every other track gives up the same number of
    /// its own events; if the first track's last popped event was cut, the
    /// matching event of each other track is cut at the same proportion.
    pub fn pop(&mut self, duration_ms: u32) -> Result<TrackGroup, ScoreError> {
        let first_duration = self.duration_ms();
        if duration_ms == 0 || duration_ms > first_duration {
            return Err(ScoreError::ArgumentRange(format!(
                "cannot pop {}ms from a track group lasting {}ms",
                duration_ms, first_duration
            )));
        }

        let mut remaining = self.tracks.clone();
        let mut popped = Vec::with_capacity(remaining.len());
        let (first, straddle) = remaining[0].split_off_at(duration_ms, SplitPolicy::STRICT)?;
        let unique_count = first.len();
        popped.push(first);
        for track in remaining.iter_mut().skip(1) {
            popped.push(track.split_off_events(unique_count, straddle)?);
        }

        let popped = TrackGroup {
            position_ms_re_container: self.position_ms_re_container,
            tracks: popped,
        };
        let remaining = TrackGroup {
            position_ms_re_container: self.position_ms_re_container + duration_ms,
            tracks: remaining,
        };
        popped.assert_consistency()?;
        remaining.assert_consistency()?;
        *self = remaining;
        Ok(popped)
    }

    pub fn assert_consistency(&self) -> Result<(), ScoreError> {
        let Some(first) = self.tracks.first() else {
            return Ok(());
        };
        for track in &self.tracks {
            track.assert_consistency()?;
            if track.len() != first.len() {
                return Err(ScoreError::invariant(
                    "track group",
                    format!(
                        "track {} has {} events but track {} has {}",
                        track.channel(),
                        track.len(),
                        first.channel(),
                        first.len()
                    ),
                ));
            }
            for (i, (a, b)) in first.events().iter().zip(track.events()).enumerate() {
                if a.kind() != b.kind() {
                    return Err(ScoreError::invariant(
                        "track group",
                        format!(
                            "event {} is a {} in track {} but a {} in track {}",
                            i,
                            a.kind(),
                            first.channel(),
                            b.kind(),
                            track.channel()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}
