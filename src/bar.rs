//! # Bars
//!
//! A [`Bar`] is the content between two barlines: output voices first, then
//! up to four input voices, all lasting exactly as long as the bar. Bars are
//! what [`Block::convert_to_bars`](crate::Block::convert_to_bars) produces and
//! what a notation writer consumes.
//!
//! ## Invariants
//! 1. the first voice is an output voice
//! 2. output voices precede input voices
//! 3. every voice has the same duration
//! 4. at most four input voices
//! 5. a bar built from a sequence has an output voice opening with a chord,
//!    optionally preceded by one clef change
//!
//! [`Bar::assert_consistency`] checks rules 1 to 4 and
//! [`Bar::assert_opens_with_chord`] checks rule 5. Bars cut from a block are
//! held to rules 1 to 4 only, since a bar in the middle of a long rest
//! legitimately holds nothing but rests.

use serde::Serialize;

use crate::error::ScoreError;
use crate::event::DurationEvent;
use crate::seq::Seq;
use crate::track::Track;
use crate::voice::{blockify, check_voice_list, Voice};
use crate::warp::{time_warp_voices, PositionWarp};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    abs_position_ms: u32,
    voices: Vec<Voice>,
}

impl Bar {
    /// Build a bar from a sequence and optional input voices.
    ///
    /// The sequence's tracks become output voices. Every voice is padded with
    /// rests so that all of them start at 0 and end together.
    pub fn from_seq(seq: Seq, input_tracks: Vec<Track>) -> Result<Self, ScoreError> {
        let abs_position_ms = seq.abs_position_ms();
        let mut voices = Vec::new();
        for track in seq.into_tracks() {
            voices.push(Voice::output(track)?);
        }
        for track in input_tracks {
            voices.push(Voice::input(track)?);
        }
        blockify(&mut voices)?;

        let bar = Self {
            abs_position_ms,
            voices,
        };
        bar.assert_consistency()?;
        bar.assert_opens_with_chord()?;
        Ok(bar)
    }

    pub(crate) fn from_popped(abs_position_ms: u32, voices: Vec<Voice>) -> Result<Self, ScoreError> {
        let bar = Self {
            abs_position_ms,
            voices,
        };
        bar.assert_consistency()?;
        Ok(bar)
    }

    pub fn abs_position_ms(&self) -> u32 {
        self.abs_position_ms
    }

    pub fn duration_ms(&self) -> u32 {
        self.voices.first().map_or(0, Voice::duration_ms)
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn into_voices(self) -> Vec<Voice> {
        self.voices
    }

    pub fn output_tracks(&self) -> impl Iterator<Item = &Track> {
        self.voices.iter().filter(|v| v.is_output()).map(Voice::track)
    }

    pub fn input_tracks(&self) -> impl Iterator<Item = &Track> {
        self.voices.iter().filter(|v| v.is_input()).map(Voice::track)
    }

    /// Check rules 1 to 4. Rule 5 is only enforced when building from a
    /// sequence, see [`Bar::assert_opens_with_chord`].
    pub fn assert_consistency(&self) -> Result<(), ScoreError> {
        check_voice_list(&self.voices, &self.context())?;
        Ok(())
    }

    fn context(&self) -> String {
        format!("bar at {}ms", self.abs_position_ms)
    }

    /// Check rule 5: some output voice opens with a chord, optionally after
    /// one clef change.
    pub fn assert_opens_with_chord(&self) -> Result<(), ScoreError> {
        let opens_with_chord = |track: &Track| {
            let mut events = track.events().iter();
            match events.next() {
                Some(DurationEvent::Chord(_)) => true,
                Some(DurationEvent::ClefChange(_)) => matches!(events.next(), Some(DurationEvent::Chord(_))),
                _ => false,
            }
        };
        if self.output_tracks().any(opens_with_chord) {
            Ok(())
        } else {
            Err(ScoreError::invariant(
                self.context(),
                "no output voice opens with a chord",
            ))
        }
    }

    /// Append `other` voice by voice.
    ///
    /// Both bars must hold the same voices in the same order. Cautionary
    /// chords opening `other`'s voices are rejoined with the chords they
    /// continue.
    pub fn concat(&mut self, other: Bar) -> Result<(), ScoreError> {
        if self.voices.len() != other.voices.len() {
            return Err(ScoreError::ArgumentRange(format!(
                "cannot append a bar of {} voices to a bar of {} voices",
                other.voices.len(),
                self.voices.len()
            )));
        }
        for (mine, theirs) in self.voices.iter().zip(&other.voices) {
            if mine.is_output() != theirs.is_output() || mine.channel() != theirs.channel() {
                return Err(ScoreError::ArgumentRange(format!(
                    "cannot append {} to {}",
                    theirs.describe(),
                    mine.describe()
                )));
            }
        }

        let mut voices = self.voices.clone();
        for (voice, incoming) in voices.iter_mut().zip(other.voices) {
            voice.track_mut().concat(incoming.into_track())?;
        }
        check_voice_list(&voices, &self.context())?;
        self.voices = voices;
        Ok(())
    }

    /// Move event boundaries through `warp`, keeping the bar's duration.
    pub fn time_warp<W: PositionWarp + ?Sized>(&mut self, warp: &W, distortion: f64) -> Result<(), ScoreError> {
        let duration_ms = self.duration_ms();
        let mut voices = self.voices.clone();
        time_warp_voices(&mut voices, duration_ms, warp, distortion)?;
        let warped_ms = check_voice_list(&voices, &self.context())?;
        if warped_ms != duration_ms {
            return Err(ScoreError::invariant(
                self.context(),
                format!("time warp changed the duration from {}ms to {}ms", duration_ms, warped_ms),
            ));
        }
        self.voices = voices;
        Ok(())
    }

    /// Rescale every voice to last exactly `duration_ms`.
    pub fn set_duration_ms(&mut self, duration_ms: u32) -> Result<(), ScoreError> {
        let mut voices = self.voices.clone();
        for voice in &mut voices {
            voice.track_mut().set_duration_ms(duration_ms)?;
        }
        check_voice_list(&voices, &self.context())?;
        self.voices = voices;
        Ok(())
    }

    pub fn transpose(&mut self, semitones: i32) {
        for voice in self.voices.iter_mut().filter(|v| v.is_output()) {
            voice.track_mut().transpose(semitones);
        }
    }
}
