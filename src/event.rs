//! # Duration Events
//!
//! The atomic timed units a [`Track`](crate::Track) is made of.
//!
//! ```text
//! DurationEvent (enum)
//!   ├── Chord            sounding pitches, velocities, optional barline override
//!   ├── Rest             silence
//!   ├── ClefChange       zero-duration clef marker
//!   └── CautionaryChord  continuation of a chord cut by a barline
//! ```
//!
//! ## Positions and spans
//! Every event stores its position relative to the first event of its track.
//! The *span* of an event is the time it occupies in its track: for a chord
//! that was cut at a barline this is `duration_to_next_barline_ms`, for all
//! other events it is the plain duration. Clef changes always span 0ms.

use std::fmt;

use serde::Serialize;

use crate::error::ScoreError;

/// Highest MIDI pitch or velocity.
pub const MIDI_MAX: u8 = 127;

/// Clef shown at the start of a staff or at a clef change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Clef {
    Treble,
    Treble8va,
    Treble15va,
    Bass,
    Bass8vb,
    Bass15vb,
    Alto,
    Tenor,
    Percussion,
}

impl Clef {
    /// Parse a clef name like "treble", "bass8vb" or "alto".
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "treble" | "g" => Some(Clef::Treble),
            "treble8va" => Some(Clef::Treble8va),
            "treble15va" => Some(Clef::Treble15va),
            "bass" | "f" => Some(Clef::Bass),
            "bass8vb" => Some(Clef::Bass8vb),
            "bass15vb" => Some(Clef::Bass15vb),
            "alto" => Some(Clef::Alto),
            "tenor" => Some(Clef::Tenor),
            "percussion" => Some(Clef::Percussion),
            _ => None,
        }
    }
}

/// Discriminant of a [`DurationEvent`], used for shape comparisons and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Chord,
    Rest,
    ClefChange,
    CautionaryChord,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Chord => "chord",
            EventKind::Rest => "rest",
            EventKind::ClefChange => "clef change",
            EventKind::CautionaryChord => "cautionary chord",
        };
        f.write_str(name)
    }
}

/// A sounding chord.
///
/// `duration_ms` is the chord's own duration and never changes when the chord
/// is cut at a barline. The cut sets `duration_to_next_barline_ms` instead, and
/// that value becomes the chord's span in its track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordEvent {
    pub position_ms: u32,
    pub duration_ms: u32,
    pub pitches: Vec<u8>,
    pub velocities: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_to_next_barline_ms: Option<u32>,
}

impl ChordEvent {
    /// Create a chord, checking durations, pitches and velocities.
    ///
    /// `velocities` must have one entry per pitch.
    pub fn new(duration_ms: u32, pitches: Vec<u8>, velocities: Vec<u8>) -> Result<Self, ScoreError> {
        if duration_ms == 0 {
            return Err(ScoreError::ArgumentRange(
                "chord duration must be greater than 0ms".to_string(),
            ));
        }
        if pitches.is_empty() {
            return Err(ScoreError::ArgumentRange(
                "a chord needs at least one pitch".to_string(),
            ));
        }
        if pitches.len() != velocities.len() {
            return Err(ScoreError::ArgumentRange(format!(
                "chord has {} pitches but {} velocities",
                pitches.len(),
                velocities.len()
            )));
        }
        if let Some(p) = pitches.iter().find(|&&p| p > MIDI_MAX) {
            return Err(ScoreError::ArgumentRange(format!(
                "pitch {} is outside 0..={}",
                p, MIDI_MAX
            )));
        }
        if let Some(v) = velocities.iter().find(|&&v| v == 0 || v > MIDI_MAX) {
            return Err(ScoreError::ArgumentRange(format!(
                "velocity {} is outside 1..={}",
                v, MIDI_MAX
            )));
        }
        Ok(Self {
            position_ms: 0,
            duration_ms,
            pitches,
            velocities,
            duration_to_next_barline_ms: None,
        })
    }

    /// Create a chord whose pitches all share one velocity.
    pub fn with_velocity(duration_ms: u32, pitches: Vec<u8>, velocity: u8) -> Result<Self, ScoreError> {
        let velocities = vec![velocity; pitches.len()];
        Self::new(duration_ms, pitches, velocities)
    }

    pub fn span_ms(&self) -> u32 {
        self.duration_to_next_barline_ms.unwrap_or(self.duration_ms)
    }

    /// Set the span, keeping the part of the chord that lies beyond a barline.
    fn set_span_ms(&mut self, span_ms: u32) {
        match self.duration_to_next_barline_ms {
            Some(before) => {
                let beyond = self.duration_ms.saturating_sub(before);
                self.duration_to_next_barline_ms = Some(span_ms);
                self.duration_ms = span_ms + beyond;
            }
            None => self.duration_ms = span_ms,
        }
    }

    pub fn transpose(&mut self, semitones: i32) {
        for pitch in &mut self.pitches {
            *pitch = (*pitch as i32 + semitones).clamp(0, MIDI_MAX as i32) as u8;
        }
    }

    pub fn scale_velocities(&mut self, factor: f64) {
        for velocity in &mut self.velocities {
            let scaled = (*velocity as f64 * factor).round();
            *velocity = scaled.clamp(1.0, MIDI_MAX as f64) as u8;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestEvent {
    pub position_ms: u32,
    pub duration_ms: u32,
}

impl RestEvent {
    pub fn new(duration_ms: u32) -> Self {
        Self {
            position_ms: 0,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClefChangeEvent {
    pub position_ms: u32,
    pub clef: Clef,
}

impl ClefChangeEvent {
    pub fn new(clef: Clef) -> Self {
        Self { position_ms: 0, clef }
    }
}

/// Continuation of a chord into the next bar. Only legal as the first event of
/// a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CautionaryChordEvent {
    pub position_ms: u32,
    pub duration_ms: u32,
    pub pitches: Vec<u8>,
}

impl CautionaryChordEvent {
    /// Continuation of `chord` lasting `duration_ms`.
    pub fn continuing(chord: &ChordEvent, duration_ms: u32) -> Self {
        Self {
            position_ms: 0,
            duration_ms,
            pitches: chord.pitches.clone(),
        }
    }

    /// A further continuation of this continuation.
    pub fn continuation(&self, duration_ms: u32) -> Self {
        Self {
            position_ms: 0,
            duration_ms,
            pitches: self.pitches.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DurationEvent {
    Chord(ChordEvent),
    Rest(RestEvent),
    ClefChange(ClefChangeEvent),
    CautionaryChord(CautionaryChordEvent),
}

impl DurationEvent {
    pub fn rest(duration_ms: u32) -> Self {
        DurationEvent::Rest(RestEvent::new(duration_ms))
    }

    pub fn clef_change(clef: Clef) -> Self {
        DurationEvent::ClefChange(ClefChangeEvent::new(clef))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            DurationEvent::Chord(_) => EventKind::Chord,
            DurationEvent::Rest(_) => EventKind::Rest,
            DurationEvent::ClefChange(_) => EventKind::ClefChange,
            DurationEvent::CautionaryChord(_) => EventKind::CautionaryChord,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, DurationEvent::Rest(_))
    }

    pub fn is_chord(&self) -> bool {
        matches!(self, DurationEvent::Chord(_))
    }

    pub fn is_clef_change(&self) -> bool {
        matches!(self, DurationEvent::ClefChange(_))
    }

    pub fn is_cautionary(&self) -> bool {
        matches!(self, DurationEvent::CautionaryChord(_))
    }

    pub fn position_ms(&self) -> u32 {
        match self {
            DurationEvent::Chord(e) => e.position_ms,
            DurationEvent::Rest(e) => e.position_ms,
            DurationEvent::ClefChange(e) => e.position_ms,
            DurationEvent::CautionaryChord(e) => e.position_ms,
        }
    }

    pub(crate) fn set_position_ms(&mut self, position_ms: u32) {
        match self {
            DurationEvent::Chord(e) => e.position_ms = position_ms,
            DurationEvent::Rest(e) => e.position_ms = position_ms,
            DurationEvent::ClefChange(e) => e.position_ms = position_ms,
            DurationEvent::CautionaryChord(e) => e.position_ms = position_ms,
        }
    }

    /// Time this event occupies in its track.
    pub fn duration_ms(&self) -> u32 {
        match self {
            DurationEvent::Chord(e) => e.span_ms(),
            DurationEvent::Rest(e) => e.duration_ms,
            DurationEvent::ClefChange(_) => 0,
            DurationEvent::CautionaryChord(e) => e.duration_ms,
        }
    }

    /// Set the time this event occupies in its track. Clef changes ignore this.
    pub(crate) fn set_duration_ms(&mut self, duration_ms: u32) {
        match self {
            DurationEvent::Chord(e) => e.set_span_ms(duration_ms),
            DurationEvent::Rest(e) => e.duration_ms = duration_ms,
            DurationEvent::ClefChange(_) => {}
            DurationEvent::CautionaryChord(e) => e.duration_ms = duration_ms,
        }
    }

    pub fn end_ms(&self) -> u32 {
        self.position_ms() + self.duration_ms()
    }

    /// Cut this event `before_ms` after its start.
    ///
    /// Returns the part before the cut and the part after it. A chord keeps its
    /// identity in the first part and is continued by a cautionary chord.
    /// Cutting a cautionary chord is only allowed when `continue_cautionary`
    /// is set.
    pub(crate) fn split(self, before_ms: u32, continue_cautionary: bool) -> Result<(DurationEvent, DurationEvent), ScoreError> {
        let total = self.duration_ms();
        debug_assert!(before_ms > 0 && before_ms < total);
        let after_ms = total - before_ms;
        match self {
            DurationEvent::Rest(mut rest) => {
                rest.duration_ms = before_ms;
                Ok((DurationEvent::Rest(rest), DurationEvent::rest(after_ms)))
            }
            DurationEvent::Chord(mut chord) => {
                let continuation = CautionaryChordEvent::continuing(&chord, after_ms);
                chord.duration_to_next_barline_ms = Some(before_ms);
                Ok((
                    DurationEvent::Chord(chord),
                    DurationEvent::CautionaryChord(continuation),
                ))
            }
            DurationEvent::CautionaryChord(mut cautionary) => {
                if !continue_cautionary {
                    return Err(ScoreError::invariant(
                        "split",
                        format!(
                            "cautionary chord at {}ms straddles the split point",
                            cautionary.position_ms
                        ),
                    ));
                }
                let continuation = cautionary.continuation(after_ms);
                cautionary.duration_ms = before_ms;
                Ok((
                    DurationEvent::CautionaryChord(cautionary),
                    DurationEvent::CautionaryChord(continuation),
                ))
            }
            DurationEvent::ClefChange(clef) => Err(ScoreError::invariant(
                "split",
                format!("clef change at {}ms has no duration to split", clef.position_ms),
            )),
        }
    }
}

impl From<ChordEvent> for DurationEvent {
    fn from(chord: ChordEvent) -> Self {
        DurationEvent::Chord(chord)
    }
}

impl From<RestEvent> for DurationEvent {
    fn from(rest: RestEvent) -> Self {
        DurationEvent::Rest(rest)
    }
}
