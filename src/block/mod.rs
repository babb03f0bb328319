//! # Blocks
//!
//! A [`Block`] holds the voices of a stretch of music that has not been cut
//! into bars yet, together with the barline positions at which it will be
//! cut. [`Block::convert_to_bars`] consumes the block and returns its bars.
//!
//! ## Life Cycle
//! 1. build from a [`Seq`]: every track becomes an output voice, padded with
//!    rests so that all voices start at 0 and end together
//! 2. optionally add input voices and append further blocks
//! 3. set barlines: strictly ascending offsets from the block start, the last
//!    one at the end of the block
//! 4. convert to bars
//!
//! ## Sub-modules
//! - `split` - the bar splitting algorithm shared by [`Block`] and [`MainBlock`]
//! - `main_block` - [`MainBlock`], the score-wide block seeded with clefs
//!
//! ## Splitting
//! Each bar takes every event ending at or before the barline. An event
//! straddling the barline is cut: a rest becomes two rests, a chord keeps its
//! full duration with `duration_to_next_barline_ms` set and its remainder
//! opens the next bar as a cautionary chord. A cautionary chord straddling a
//! barline is truncated and continued again in the next bar.
//!
//! Clef changes exactly on a barline open the next bar in a [`Block`], and
//! close the previous bar in a [`MainBlock`].

mod main_block;
mod split;

#[cfg(test)]
mod tests;

pub use main_block::MainBlock;

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ScoreError;
use crate::event::{Clef, DurationEvent};
use crate::seq::Seq;
use crate::track::Track;
use crate::voice::{blockify, check_voice_list, Voice, MAX_INPUT_CHANNEL, MAX_INPUT_VOICES};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    abs_position_ms: u32,
    voices: Vec<Voice>,
    barlines_ms: Vec<u32>,
}

impl Block {
    /// Takes ownership of the sequence's tracks, which become output voices.
    pub fn from_seq(seq: Seq) -> Result<Self, ScoreError> {
        let abs_position_ms = seq.abs_position_ms();
        let voices = seq
            .into_tracks()
            .into_iter()
            .map(Voice::output)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_voices(abs_position_ms, voices)
    }

    fn from_voices(abs_position_ms: u32, mut voices: Vec<Voice>) -> Result<Self, ScoreError> {
        blockify(&mut voices)?;
        let block = Self {
            abs_position_ms,
            voices,
            barlines_ms: Vec::new(),
        };
        block.assert_consistency()?;
        Ok(block)
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

    pub fn output_tracks(&self) -> impl Iterator<Item = &Track> {
        self.voices.iter().filter(|v| v.is_output()).map(Voice::track)
    }

    pub fn input_tracks(&self) -> impl Iterator<Item = &Track> {
        self.voices.iter().filter(|v| v.is_input()).map(Voice::track)
    }

    pub fn barline_positions(&self) -> &[u32] {
        &self.barlines_ms
    }

    fn context(&self) -> String {
        format!("block at {}ms", self.abs_position_ms)
    }

    /// Voice ordering, voice counts and durations, plus every voice starting
    /// at 0 within the block.
    pub fn assert_consistency(&self) -> Result<(), ScoreError> {
        let context = self.context();
        check_voice_list(&self.voices, &context)?;
        if let Some(voice) = self.voices.iter().find(|v| v.track().position_ms_re_container() != 0) {
            return Err(ScoreError::invariant(
                context,
                format!(
                    "{} starts at {}ms instead of 0",
                    voice.describe(),
                    voice.track().position_ms_re_container()
                ),
            ));
        }
        Ok(())
    }

    /// Add a voice that a live performer plays along with the block.
    ///
    /// The track's offset is folded into a leading rest. The block grows if
    /// the voice ends after it. Fails without changing the block when the
    /// block already has four input voices, when the channel is outside
    /// 0..=3, or when the channel is taken.
    pub fn add_input_voice(&mut self, track: Track) -> Result<(), ScoreError> {
        let input_count = self.voices.iter().filter(|v| v.is_input()).count();
        if input_count >= MAX_INPUT_VOICES {
            return Err(ScoreError::ArgumentRange(format!(
                "{} already has {} input voices",
                self.context(),
                MAX_INPUT_VOICES
            )));
        }
        if track.channel() > MAX_INPUT_CHANNEL {
            return Err(ScoreError::ArgumentRange(format!(
                "input voice channel {} is outside 0..={}",
                track.channel(),
                MAX_INPUT_CHANNEL
            )));
        }
        if self.input_tracks().any(|t| t.channel() == track.channel()) {
            return Err(ScoreError::ArgumentRange(format!(
                "{} already has an input voice on channel {}",
                self.context(),
                track.channel()
            )));
        }

        let mut voices = self.voices.clone();
        voices.push(Voice::input(track)?);
        blockify(&mut voices)?;
        check_voice_list(&voices, &self.context())?;
        self.voices = voices;
        Ok(())
    }

    /// Replace the barlines.
    ///
    /// Positions are offsets from the block start: strictly ascending, above
    /// 0 and not past the end of the block.
    pub fn set_barlines(&mut self, barlines_ms: Vec<u32>) -> Result<(), ScoreError> {
        self.check_barlines(&barlines_ms)?;
        self.barlines_ms = barlines_ms;
        Ok(())
    }

    pub fn add_barline(&mut self, position_ms: u32) -> Result<(), ScoreError> {
        let mut barlines_ms = self.barlines_ms.clone();
        barlines_ms.push(position_ms);
        self.set_barlines(barlines_ms)
    }

    fn check_barlines(&self, barlines_ms: &[u32]) -> Result<(), ScoreError> {
        let duration_ms = self.duration_ms();
        let mut previous_ms = 0;
        for &position_ms in barlines_ms {
            if position_ms <= previous_ms {
                return Err(ScoreError::barline(
                    position_ms,
                    format!("barlines must be strictly ascending and after 0ms (previous at {}ms)", previous_ms),
                ));
            }
            if position_ms > duration_ms {
                return Err(ScoreError::barline(
                    position_ms,
                    format!("barline is past the end of the block ({}ms)", duration_ms),
                ));
            }
            previous_ms = position_ms;
        }
        Ok(())
    }

    /// Append `other` after the end of this block.
    ///
    /// Output voices are matched by index and must be on the same channels.
    /// Input voices are matched by channel; a voice present in only one of
    /// the blocks is filled with a rest where the other block has none.
    /// `other`'s barlines are shifted by this block's duration and appended.
    pub fn concat(&mut self, other: Block) -> Result<(), ScoreError> {
        let self_outputs: Vec<u8> = self.output_tracks().map(Track::channel).collect();
        let other_outputs: Vec<u8> = other.output_tracks().map(Track::channel).collect();
        if self_outputs != other_outputs {
            return Err(ScoreError::ArgumentRange(format!(
                "cannot append a block with output channels {:?} to one with output channels {:?}",
                other_outputs, self_outputs
            )));
        }

        let start_ms = self.duration_ms();
        let other_ms = other.duration_ms();
        let mut voices = self.voices.clone();
        let mut incoming_inputs: HashMap<u8, Track> = HashMap::new();
        let mut incoming_order = Vec::new();
        let mut index = 0;
        for voice in other.voices {
            match voice {
                Voice::Output(track) => {
                    voices[index].track_mut().concat(track)?;
                    index += 1;
                }
                Voice::Input(track) => {
                    incoming_order.push(track.channel());
                    incoming_inputs.insert(track.channel(), track);
                }
            }
        }

        let added = incoming_order
            .iter()
            .filter(|&&channel| !self.input_tracks().any(|t| t.channel() == channel))
            .count();
        let input_count = self.input_tracks().count() + added;
        if input_count > MAX_INPUT_VOICES {
            return Err(ScoreError::ArgumentRange(format!(
                "appending would give {} {} input voices, at most {} are allowed",
                self.context(),
                input_count,
                MAX_INPUT_VOICES
            )));
        }

        for voice in voices.iter_mut().filter(|v| v.is_input()) {
            let track = voice.track_mut();
            match incoming_inputs.remove(&track.channel()) {
                Some(incoming) => track.concat(incoming)?,
                None if other_ms > 0 => track.add(DurationEvent::rest(other_ms))?,
                None => {}
            }
        }
        for channel in incoming_order {
            let Some(incoming) = incoming_inputs.remove(&channel) else {
                continue;
            };
            let mut track = incoming.empty_like();
            if start_ms > 0 {
                track.add(DurationEvent::rest(start_ms))?;
            }
            track.concat(incoming)?;
            voices.push(Voice::Input(track));
        }

        let context = self.context();
        check_voice_list(&voices, &context)?;
        let mut barlines_ms = self.barlines_ms.clone();
        barlines_ms.extend(other.barlines_ms.iter().map(|b| b + start_ms));

        self.voices = voices;
        self.barlines_ms = barlines_ms;
        Ok(())
    }

    /// Put a clef change into the output voice on `channel` at `position_ms`.
    ///
    /// The position must be an event boundary of that voice. The new clef
    /// replaces a clef change already at that position.
    pub fn insert_clef_change(&mut self, channel: u8, position_ms: u32, clef: Clef) -> Result<(), ScoreError> {
        let context = self.context();
        let voice = self
            .voices
            .iter_mut()
            .find(|v| v.is_output() && v.channel() == channel)
            .ok_or_else(|| ScoreError::ArgumentRange(format!("{} has no output voice on channel {}", context, channel)))?;
        let track = voice.track_mut();
        let index = if position_ms == track.duration_ms() {
            track.len()
        } else {
            track
                .events()
                .iter()
                .position(|e| e.position_ms() == position_ms && !e.is_clef_change())
                .ok_or_else(|| {
                    ScoreError::ArgumentRange(format!(
                        "{}ms is not an event boundary of output voice {}",
                        position_ms, channel
                    ))
                })?
        };
        track.insert_clef_change(index, clef)
    }

    pub fn transpose(&mut self, semitones: i32) {
        for voice in self.voices.iter_mut().filter(|v| v.is_output()) {
            voice.track_mut().transpose(semitones);
        }
    }

    pub fn adjust_velocities(&mut self, factor: f64) -> Result<(), ScoreError> {
        for voice in self.voices.iter_mut().filter(|v| v.is_output()) {
            voice.track_mut().adjust_velocities(factor)?;
        }
        Ok(())
    }
}
