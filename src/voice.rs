//! # Voices
//!
//! A [`Voice`] is a track tagged with its role in a bar or block:
//!
//! - **Output** voices are performed from the score. They accept clef changes
//!   and cautionary chords. Channels 0..=15.
//! - **Input** voices describe what a live performer plays. They accept
//!   cautionary chords but no clef changes. Channels 0..=3, at most four of
//!   them per container.
//!
//! Voice lists (the contents of a bar or block) always hold output voices
//! first, then input voices.

use serde::Serialize;

use crate::error::ScoreError;
use crate::event::DurationEvent;
use crate::track::{SplitPolicy, Track};

pub const MAX_INPUT_VOICES: usize = 4;
pub const MAX_INPUT_CHANNEL: u8 = 3;
pub const MAX_OUTPUT_CHANNEL: u8 = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "track", rename_all = "kebab-case")]
pub enum Voice {
    Output(Track),
    Input(Track),
}

impl Voice {
    pub fn output(mut track: Track) -> Result<Voice, ScoreError> {
        if track.channel() > MAX_OUTPUT_CHANNEL {
            return Err(ScoreError::ArgumentRange(format!(
                "output channel {} is outside 0..={}",
                track.channel(),
                MAX_OUTPUT_CHANNEL
            )));
        }
        track.set_permissions(true, true)?;
        Ok(Voice::Output(track))
    }

    pub fn input(mut track: Track) -> Result<Voice, ScoreError> {
        if track.channel() > MAX_INPUT_CHANNEL {
            return Err(ScoreError::ArgumentRange(format!(
                "input voice channel {} is outside 0..={}",
                track.channel(),
                MAX_INPUT_CHANNEL
            )));
        }
        track.set_permissions(true, false)?;
        Ok(Voice::Input(track))
    }

    pub fn track(&self) -> &Track {
        match self {
            Voice::Output(track) | Voice::Input(track) => track,
        }
    }

    pub(crate) fn track_mut(&mut self) -> &mut Track {
        match self {
            Voice::Output(track) | Voice::Input(track) => track,
        }
    }

    pub fn into_track(self) -> Track {
        match self {
            Voice::Output(track) | Voice::Input(track) => track,
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Voice::Output(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Voice::Input(_))
    }

    pub fn channel(&self) -> u8 {
        self.track().channel()
    }

    pub fn duration_ms(&self) -> u32 {
        self.track().duration_ms()
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Voice::Output(track) => format!("output voice {}", track.channel()),
            Voice::Input(track) => format!("input voice {}", track.channel()),
        }
    }

    /// Same kind, wrapping another track.
    pub(crate) fn rewrap(&self, track: Track) -> Voice {
        match self {
            Voice::Output(_) => Voice::Output(track),
            Voice::Input(_) => Voice::Input(track),
        }
    }

    /// Split off everything before `boundary_ms`; this voice keeps the rest.
    pub(crate) fn split_off_at(&mut self, boundary_ms: u32, policy: SplitPolicy) -> Result<Voice, ScoreError> {
        let (popped, _) = self.track_mut().split_off_at(boundary_ms, policy)?;
        Ok(self.rewrap(popped))
    }
}

/// Check voice ordering, voice counts and durations.
///
/// Returns the common duration of the voices.
pub(crate) fn check_voice_list(voices: &[Voice], context: &str) -> Result<u32, ScoreError> {
    let first = voices
        .first()
        .ok_or_else(|| ScoreError::invariant(context, "there are no voices"))?;
    if !first.is_output() {
        return Err(ScoreError::invariant(context, "the first voice must be an output voice"));
    }

    let mut seen_input = false;
    let mut output_channels = Vec::new();
    let mut input_channels = Vec::new();
    for voice in voices {
        match voice {
            Voice::Output(track) => {
                if seen_input {
                    return Err(ScoreError::invariant(
                        context,
                        format!("output voice {} follows an input voice", track.channel()),
                    ));
                }
                if output_channels.contains(&track.channel()) {
                    return Err(ScoreError::invariant(
                        context,
                        format!("output channel {} is used twice", track.channel()),
                    ));
                }
                output_channels.push(track.channel());
            }
            Voice::Input(track) => {
                seen_input = true;
                if input_channels.contains(&track.channel()) {
                    return Err(ScoreError::invariant(
                        context,
                        format!("input channel {} is used twice", track.channel()),
                    ));
                }
                input_channels.push(track.channel());
            }
        }
        voice.track().assert_consistency()?;
    }
    if input_channels.len() > MAX_INPUT_VOICES {
        return Err(ScoreError::invariant(
            context,
            format!(
                "{} input voices, at most {} are allowed",
                input_channels.len(),
                MAX_INPUT_VOICES
            ),
        ));
    }

    let duration_ms = first.duration_ms();
    if let Some(other) = voices.iter().find(|v| v.duration_ms() != duration_ms) {
        return Err(ScoreError::invariant(
            context,
            format!(
                "{} lasts {}ms but {} lasts {}ms",
                other.describe(),
                other.duration_ms(),
                first.describe(),
                duration_ms
            ),
        ));
    }
    Ok(duration_ms)
}

/// Pad every voice with rests so that all of them start at 0 and end together.
///
/// Voice offsets are folded into leading rests. Empty voices become a single
/// rest spanning the whole container.
pub(crate) fn blockify(voices: &mut [Voice]) -> Result<u32, ScoreError> {
    let duration_ms = voices
        .iter()
        .map(|v| v.track().end_ms_re_container())
        .max()
        .unwrap_or(0);

    for voice in voices.iter_mut() {
        let track = voice.track_mut();
        let offset_ms = track.position_ms_re_container();
        if offset_ms > 0 {
            track.insert(0, DurationEvent::rest(offset_ms))?;
            track.set_position_ms_re_container(0);
        }
        let end_ms = track.duration_ms();
        if end_ms < duration_ms {
            track.add(DurationEvent::rest(duration_ms - end_ms))?;
        }
    }
    Ok(duration_ms)
}
