//! # Sequences
//!
//! A [`Seq`] is the raw material bars and blocks are made from: one track per
//! output channel, each with its own offset in the sequence. Sequences are
//! kept normalized, so the earliest track starts at offset 0 and the
//! sequence's absolute position is where that track starts in the score.

use crate::error::ScoreError;
use crate::event::DurationEvent;
use crate::track::Track;
use crate::voice::MAX_OUTPUT_CHANNEL;

#[derive(Debug, Clone, PartialEq)]
pub struct Seq {
    abs_position_ms: u32,
    tracks: Vec<Track>,
}

impl Seq {
    /// Takes ownership of `tracks`. Channels must be unique and every track
    /// must hold at least one event.
    pub fn new(abs_position_ms: u32, tracks: Vec<Track>) -> Result<Self, ScoreError> {
        if tracks.is_empty() {
            return Err(ScoreError::ArgumentRange(
                "a sequence needs at least one track".to_string(),
            ));
        }
        let mut channels = Vec::with_capacity(tracks.len());
        for track in &tracks {
            if track.channel() > MAX_OUTPUT_CHANNEL {
                return Err(ScoreError::ArgumentRange(format!(
                    "track channel {} is outside 0..={}",
                    track.channel(),
                    MAX_OUTPUT_CHANNEL
                )));
            }
            if channels.contains(&track.channel()) {
                return Err(ScoreError::ArgumentRange(format!(
                    "channel {} has more than one track",
                    track.channel()
                )));
            }
            if track.is_empty() {
                return Err(ScoreError::ArgumentRange(format!(
                    "track {} has no events",
                    track.channel()
                )));
            }
            track.assert_consistency()?;
            channels.push(track.channel());
        }

        let mut seq = Self {
            abs_position_ms,
            tracks,
        };
        seq.normalize();
        Ok(seq)
    }

    /// Shift track offsets so the earliest track starts at 0.
    fn normalize(&mut self) {
        let earliest = self
            .tracks
            .iter()
            .map(Track::position_ms_re_container)
            .min()
            .unwrap_or(0);
        if earliest > 0 {
            for track in &mut self.tracks {
                let offset = track.position_ms_re_container();
                track.set_position_ms_re_container(offset - earliest);
            }
            self.abs_position_ms += earliest;
        }
    }

    pub fn abs_position_ms(&self) -> u32 {
        self.abs_position_ms
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    pub fn track(&self, channel: u8) -> Option<&Track> {
        self.tracks.iter().find(|t| t.channel() == channel)
    }

    /// End of the latest track.
    pub fn duration_ms(&self) -> u32 {
        self.tracks
            .iter()
            .map(Track::end_ms_re_container)
            .max()
            .unwrap_or(0)
    }

    /// Append `other` so that it starts where this sequence ends.
    ///
    /// Tracks are matched by channel. A matching track is padded with a rest
    /// up to the start of the appended material; channels new to this
    /// sequence are added with the appropriate offset. `other`'s absolute
    /// position is ignored.
    pub fn concat(&mut self, other: Seq) -> Result<(), ScoreError> {
        let start_ms = self.duration_ms();
        for incoming in other.tracks {
            let target_ms = start_ms
                .checked_add(incoming.position_ms_re_container())
                .ok_or_else(|| {
                    ScoreError::ArgumentRange(format!(
                        "track {} would start after {}ms",
                        incoming.channel(),
                        u32::MAX
                    ))
                })?;
            match self.tracks.iter_mut().find(|t| t.channel() == incoming.channel()) {
                Some(track) => {
                    let gap_ms = target_ms - track.end_ms_re_container();
                    if gap_ms > 0 {
                        track.add(DurationEvent::rest(gap_ms))?;
                    }
                    track.concat(incoming)?;
                }
                None => {
                    let offset_ms = incoming.position_ms_re_container();
                    self.tracks.push(incoming.with_offset(start_ms + offset_ms));
                }
            }
        }
        Ok(())
    }

    pub fn transpose(&mut self, semitones: i32) {
        for track in &mut self.tracks {
            track.transpose(semitones);
        }
    }

    pub fn adjust_velocities(&mut self, factor: f64) -> Result<(), ScoreError> {
        for track in &mut self.tracks {
            track.adjust_velocities(factor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChordEvent;

    fn chord(duration_ms: u32) -> DurationEvent {
        ChordEvent::with_velocity(duration_ms, vec![55], 70).unwrap().into()
    }

    #[test]
    fn test_new_normalizes_offsets() {
        let seq = Seq::new(
            1000,
            vec![
                Track::new(0, vec![chord(100)]).unwrap().with_offset(200),
                Track::new(1, vec![chord(100)]).unwrap().with_offset(50),
            ],
        )
        .unwrap();
        assert_eq!(seq.abs_position_ms(), 1050);
        assert_eq!(seq.tracks()[0].position_ms_re_container(), 150);
        assert_eq!(seq.tracks()[1].position_ms_re_container(), 0);
        assert_eq!(seq.duration_ms(), 250);
    }

    #[test]
    fn test_new_rejects_bad_tracks() {
        assert!(Seq::new(0, vec![]).is_err());
        assert!(Seq::new(0, vec![Track::empty(0)]).is_err());
        let duplicate = vec![
            Track::new(2, vec![chord(100)]).unwrap(),
            Track::new(2, vec![chord(100)]).unwrap(),
        ];
        assert!(matches!(Seq::new(0, duplicate), Err(ScoreError::ArgumentRange(_))));
        assert!(Seq::new(0, vec![Track::new(16, vec![chord(100)]).unwrap()]).is_err());
    }

    #[test]
    fn test_concat_aligns_by_channel() {
        let mut seq = Seq::new(
            0,
            vec![
                Track::new(0, vec![chord(300)]).unwrap(),
                Track::new(1, vec![chord(100)]).unwrap(),
            ],
        )
        .unwrap();
        let other = Seq::new(
            5000,
            vec![
                Track::new(1, vec![chord(50)]).unwrap(),
                Track::new(2, vec![chord(80)]).unwrap().with_offset(20),
            ],
        )
        .unwrap();
        seq.concat(other).unwrap();

        let one = seq.track(1).unwrap();
        let durations: Vec<u32> = one.events().iter().map(DurationEvent::duration_ms).collect();
        assert_eq!(durations, vec![100, 200, 50]);
        let two = seq.track(2).unwrap();
        assert_eq!(two.position_ms_re_container(), 320);
        assert_eq!(seq.duration_ms(), 400);
    }
}
