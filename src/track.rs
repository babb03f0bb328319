//! # Tracks
//!
//! A [`Track`] is the ordered event list of one voice. Every mutation leaves
//! the track finalized: consecutive rests merged and running positions
//! recomputed from the event spans.
//!
//! ## Invariants
//! - the first event is at 0ms and each event starts where the previous ends
//! - no two consecutive rests
//! - clef changes only when `allows_clef_change`, and they span 0ms
//! - a cautionary chord only as the first event, and only when
//!   `allows_cautionary_chord`
//! - every other event spans more than 0ms
//!
//! ## Splitting
//! [`Track::pop`] cuts a track at a duration. Events that end at or before
//! the cut go to the popped track, events that start at or after it stay.
//! An event straddling the cut is split in two (see
//! [`DurationEvent`](crate::DurationEvent)).

use log::debug;
use serde::Serialize;

use crate::error::ScoreError;
use crate::event::{Clef, DurationEvent, MIDI_MAX};

/// Where a clef change lying exactly on a split point goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundaryClef {
    /// Into the earlier half.
    Before,
    /// Into the later half, like every other event starting at the split point.
    After,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitPolicy {
    pub continue_cautionary: bool,
    pub boundary_clef: BoundaryClef,
}

impl SplitPolicy {
    /// Track and track-group pops: a straddling continuation is an error.
    pub(crate) const STRICT: SplitPolicy = SplitPolicy {
        continue_cautionary: false,
        boundary_clef: BoundaryClef::Before,
    };
}

/// Durations either side of a cut event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Straddle {
    pub before_ms: u32,
    pub after_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    channel: u8,
    position_ms_re_container: u32,
    events: Vec<DurationEvent>,
    #[serde(skip)]
    allows_cautionary_chord: bool,
    #[serde(skip)]
    allows_clef_change: bool,
}

impl Track {
    /// Create a track of chords and rests.
    ///
    /// Consecutive rests are merged and positions are computed from the event
    /// durations. Clef changes and cautionary chords are rejected: they only
    /// become legal once the track belongs to a block or bar.
    pub fn new(channel: u8, events: Vec<DurationEvent>) -> Result<Self, ScoreError> {
        let mut track = Track::empty(channel);
        track.add_range(events)?;
        Ok(track)
    }

    pub fn empty(channel: u8) -> Self {
        Self {
            channel,
            position_ms_re_container: 0,
            events: Vec::new(),
            allows_cautionary_chord: false,
            allows_clef_change: false,
        }
    }

    /// Builder-style setter for the offset of the first event in the container.
    pub fn with_offset(mut self, position_ms_re_container: u32) -> Self {
        self.position_ms_re_container = position_ms_re_container;
        self
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn events(&self) -> &[DurationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn position_ms_re_container(&self) -> u32 {
        self.position_ms_re_container
    }

    pub fn set_position_ms_re_container(&mut self, position_ms: u32) {
        self.position_ms_re_container = position_ms;
    }

    pub fn allows_cautionary_chord(&self) -> bool {
        self.allows_cautionary_chord
    }

    pub fn allows_clef_change(&self) -> bool {
        self.allows_clef_change
    }

    /// Change which notation events the track accepts. Fails if the track
    /// already holds an event the new permissions forbid.
    pub fn set_permissions(&mut self, allows_cautionary_chord: bool, allows_clef_change: bool) -> Result<(), ScoreError> {
        if !allows_cautionary_chord && self.events.iter().any(DurationEvent::is_cautionary) {
            return Err(ScoreError::ArgumentRange(format!(
                "{} holds a cautionary chord",
                self.context()
            )));
        }
        if !allows_clef_change && self.events.iter().any(DurationEvent::is_clef_change) {
            return Err(ScoreError::ArgumentRange(format!(
                "{} holds a clef change",
                self.context()
            )));
        }
        self.allows_cautionary_chord = allows_cautionary_chord;
        self.allows_clef_change = allows_clef_change;
        Ok(())
    }

    /// An empty track with the same channel and permissions.
    pub(crate) fn empty_like(&self) -> Track {
        Track {
            channel: self.channel,
            position_ms_re_container: 0,
            events: Vec::new(),
            allows_cautionary_chord: self.allows_cautionary_chord,
            allows_clef_change: self.allows_clef_change,
        }
    }

    /// Total span of the events.
    pub fn duration_ms(&self) -> u32 {
        self.events.iter().map(DurationEvent::duration_ms).sum()
    }

    /// End of the last event, relative to the container. Saturates at
    /// `u32::MAX`; folding such an offset into the track then fails.
    pub fn end_ms_re_container(&self) -> u32 {
        self.position_ms_re_container.saturating_add(self.duration_ms())
    }

    fn context(&self) -> String {
        format!("track {}", self.channel)
    }

    /// Fails if adding `added` events would take the track past `u32::MAX`ms.
    fn check_length<'a>(&self, added: impl IntoIterator<Item = &'a DurationEvent>) -> Result<(), ScoreError> {
        let mut total_ms = self.duration_ms();
        for event in added {
            total_ms = total_ms.checked_add(event.duration_ms()).ok_or_else(|| {
                ScoreError::ArgumentRange(format!(
                    "{} would last longer than {}ms",
                    self.context(),
                    u32::MAX
                ))
            })?;
        }
        Ok(())
    }

    fn check_insertable(&self, index: usize, event: &DurationEvent) -> Result<(), ScoreError> {
        match event {
            DurationEvent::ClefChange(_) if !self.allows_clef_change => {
                return Err(ScoreError::ArgumentRange(format!(
                    "{} does not allow clef changes",
                    self.context()
                )));
            }
            DurationEvent::CautionaryChord(_) if !self.allows_cautionary_chord => {
                return Err(ScoreError::ArgumentRange(format!(
                    "{} does not allow cautionary chords",
                    self.context()
                )));
            }
            DurationEvent::CautionaryChord(_) if index != 0 => {
                return Err(ScoreError::ArgumentRange(format!(
                    "a cautionary chord can only be the first event of {} (index {})",
                    self.context(),
                    index
                )));
            }
            _ => {}
        }
        if index == 0 && self.events.first().is_some_and(DurationEvent::is_cautionary) {
            return Err(ScoreError::ArgumentRange(format!(
                "cannot insert before the cautionary chord that opens {}",
                self.context()
            )));
        }
        if !event.is_clef_change() && event.duration_ms() == 0 {
            return Err(ScoreError::ArgumentRange(format!(
                "{} events must last longer than 0ms",
                event.kind()
            )));
        }
        Ok(())
    }

    /// Merge rests, then recompute positions.
    fn finalize(&mut self) {
        self.agglomerate_rests();
        self.set_positions();
    }

    pub fn add(&mut self, event: DurationEvent) -> Result<(), ScoreError> {
        self.check_insertable(self.events.len(), &event)?;
        self.check_length([&event])?;
        self.events.push(event);
        self.finalize();
        Ok(())
    }

    pub fn insert(&mut self, index: usize, event: DurationEvent) -> Result<(), ScoreError> {
        if index > self.events.len() {
            return Err(ScoreError::ArgumentRange(format!(
                "insert index {} is past the end of {} ({} events)",
                index,
                self.context(),
                self.events.len()
            )));
        }
        self.check_insertable(index, &event)?;
        self.check_length([&event])?;
        self.events.insert(index, event);
        self.finalize();
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<DurationEvent, ScoreError> {
        if index >= self.events.len() {
            return Err(ScoreError::ArgumentRange(format!(
                "remove index {} is past the end of {} ({} events)",
                index,
                self.context(),
                self.events.len()
            )));
        }
        let removed = self.events.remove(index);
        self.finalize();
        Ok(removed)
    }

    /// Append events. Nothing is appended if any of them is illegal here.
    pub fn add_range(&mut self, events: impl IntoIterator<Item = DurationEvent>) -> Result<(), ScoreError> {
        let events: Vec<DurationEvent> = events.into_iter().collect();
        let start = self.events.len();
        for (i, event) in events.iter().enumerate() {
            if start + i == 0 {
                self.check_insertable(0, event)?;
            } else if event.is_cautionary() {
                return Err(ScoreError::ArgumentRange(format!(
                    "a cautionary chord can only be the first event of {} (index {})",
                    self.context(),
                    start + i
                )));
            } else {
                self.check_insertable(start + i, event)?;
            }
        }
        self.check_length(&events)?;
        self.events.extend(events);
        self.finalize();
        Ok(())
    }

    /// Append the events of `other`, ignoring its offset.
    ///
    /// A cautionary chord opening `other` is rejoined with the cut chord it
    /// continues at the end of this track. A continuation with nothing to
    /// rejoin becomes a rest.
    pub fn concat(&mut self, other: Track) -> Result<(), ScoreError> {
        self.check_length(&other.events)?;
        let mut incoming = other.events;
        let leading = match incoming.first() {
            Some(DurationEvent::CautionaryChord(continuation)) => Some(continuation.clone()),
            _ => None,
        };
        if let Some(continuation) = leading {
            let rejoined = match self.events.last_mut() {
                Some(DurationEvent::Chord(chord))
                    if chord.duration_to_next_barline_ms.is_some()
                        && chord.pitches == continuation.pitches =>
                {
                    let span = chord.span_ms() + continuation.duration_ms;
                    if span >= chord.duration_ms {
                        chord.duration_ms = span;
                        chord.duration_to_next_barline_ms = None;
                    } else {
                        chord.duration_to_next_barline_ms = Some(span);
                    }
                    true
                }
                Some(DurationEvent::CautionaryChord(previous)) if previous.pitches == continuation.pitches => {
                    previous.duration_ms += continuation.duration_ms;
                    true
                }
                _ => false,
            };
            if rejoined {
                incoming.remove(0);
            } else if !self.events.is_empty() {
                debug!(
                    "{}: continuation of {}ms has no chord to rejoin, replacing it with a rest",
                    self.context(),
                    continuation.duration_ms
                );
                incoming[0] = DurationEvent::rest(continuation.duration_ms);
            }
        }
        self.add_range(incoming)?;
        self.remove_duplicate_clef_changes();
        Ok(())
    }

    /// Recompute every event position from the spans of the events before it.
    pub fn set_positions(&mut self) {
        let mut position_ms = 0;
        for event in &mut self.events {
            event.set_position_ms(position_ms);
            position_ms += event.duration_ms();
        }
    }

    /// Overwrite event spans in order, then recompute positions.
    pub(crate) fn set_event_durations(&mut self, durations_ms: &[u32]) {
        debug_assert_eq!(durations_ms.len(), self.events.len());
        for (event, &duration_ms) in self.events.iter_mut().zip(durations_ms) {
            event.set_duration_ms(duration_ms);
        }
        self.set_positions();
    }

    /// Merge each run of consecutive rests into its first rest.
    pub fn agglomerate_rests(&mut self) {
        let mut merged: Vec<DurationEvent> = Vec::with_capacity(self.events.len());
        for event in std::mem::take(&mut self.events) {
            if let (Some(DurationEvent::Rest(previous)), DurationEvent::Rest(rest)) = (merged.last_mut(), &event) {
                previous.duration_ms += rest.duration_ms;
                continue;
            }
            merged.push(event);
        }
        self.events = merged;
    }

    /// Drop clef changes that repeat the clef already in force, and clef
    /// changes immediately followed by another one.
    pub fn remove_duplicate_clef_changes(&mut self) {
        let mut kept: Vec<DurationEvent> = Vec::with_capacity(self.events.len());
        for event in std::mem::take(&mut self.events) {
            if let DurationEvent::ClefChange(change) = &event {
                if kept.last().is_some_and(DurationEvent::is_clef_change) {
                    kept.pop();
                }
                let in_force = kept.iter().rev().find_map(|e| match e {
                    DurationEvent::ClefChange(c) => Some(c.clef),
                    _ => None,
                });
                if in_force == Some(change.clef) {
                    continue;
                }
            }
            kept.push(event);
        }
        self.events = kept;
        self.finalize();
    }

    /// Rescale every event so that the track lasts exactly `duration_ms`.
    ///
    /// Durations are rounded to whole milliseconds; the rounding error is then
    /// taken up by the earliest events that can absorb it.
    pub fn set_duration_ms(&mut self, duration_ms: u32) -> Result<(), ScoreError> {
        let old_duration = self.duration_ms();
        if old_duration == 0 {
            return Err(ScoreError::ArgumentRange(format!(
                "{} has no duration to rescale",
                self.context()
            )));
        }
        let timed = self.events.iter().filter(|e| !e.is_clef_change()).count() as u32;
        if duration_ms < timed {
            return Err(ScoreError::ArgumentRange(format!(
                "{}ms is too short for the {} timed events of {}",
                duration_ms,
                timed,
                self.context()
            )));
        }
        let factor = duration_ms as f64 / old_duration as f64;
        for event in self.events.iter_mut().filter(|e| !e.is_clef_change()) {
            let scaled = (event.duration_ms() as f64 * factor).round() as u32;
            event.set_duration_ms(scaled.max(1));
        }

        let rounded_ms: i64 = self.events.iter().map(|e| e.duration_ms() as i64).sum();
        let mut error = duration_ms as i64 - rounded_ms;
        for event in self.events.iter_mut().filter(|e| !e.is_clef_change()) {
            if error == 0 {
                break;
            }
            let current = event.duration_ms() as i64;
            let corrected = (current + error).max(1);
            error -= corrected - current;
            event.set_duration_ms(corrected as u32);
        }
        debug_assert_eq!(error, 0);
        self.set_positions();
        Ok(())
    }

    /// Split off and return the first `duration_ms` of this track.
    ///
    /// This track keeps the rest of its events and moves its offset forward by
    /// `duration_ms`.
    pub fn pop(&mut self, duration_ms: u32) -> Result<Track, ScoreError> {
        if duration_ms == 0 || duration_ms > self.duration_ms() {
            return Err(ScoreError::ArgumentRange(format!(
                "cannot pop {}ms from {} lasting {}ms",
                duration_ms,
                self.context(),
                self.duration_ms()
            )));
        }
        let (mut popped, _) = self.split_off_at(duration_ms, SplitPolicy::STRICT)?;
        popped.position_ms_re_container = self.position_ms_re_container;
        self.position_ms_re_container += duration_ms;
        Ok(popped)
    }

    /// Split this track at `boundary_ms` (relative to its first event).
    ///
    /// Returns the earlier half and, when an event was cut, the durations on
    /// either side of the cut. This track keeps the later half. On error the
    /// track is left untouched.
    pub(crate) fn split_off_at(&mut self, boundary_ms: u32, policy: SplitPolicy) -> Result<(Track, Option<Straddle>), ScoreError> {
        let mut popped_events: Vec<DurationEvent> = Vec::new();
        let mut remaining_events: Vec<DurationEvent> = Vec::new();
        let mut straddle = None;

        for event in &self.events {
            let start = event.position_ms();
            let end = event.end_ms();
            let clef_before_barline = event.is_clef_change()
                && start == boundary_ms
                && policy.boundary_clef == BoundaryClef::Before
                && remaining_events.is_empty();

            if start >= boundary_ms && !clef_before_barline {
                remaining_events.push(event.clone());
            } else if end <= boundary_ms {
                popped_events.push(event.clone());
            } else {
                if !remaining_events.is_empty() {
                    return Err(ScoreError::barline(
                        boundary_ms,
                        format!(
                            "{} already continues past the barline when the {} at {}ms is cut",
                            self.context(),
                            event.kind(),
                            start
                        ),
                    ));
                }
                if event.is_chord() && !self.allows_cautionary_chord {
                    return Err(ScoreError::ArgumentRange(format!(
                        "{} does not allow cautionary chords, so the chord at {}ms cannot be cut",
                        self.context(),
                        start
                    )));
                }
                let before_ms = boundary_ms - start;
                let (head, tail) = event.clone().split(before_ms, policy.continue_cautionary)?;
                straddle = Some(Straddle {
                    before_ms,
                    after_ms: end - boundary_ms,
                });
                popped_events.push(head);
                remaining_events.push(tail);
            }
        }

        let mut popped = self.empty_like();
        popped.events = popped_events;
        popped.finalize();
        self.events = remaining_events;
        self.finalize();
        Ok((popped, straddle))
    }

    /// Split off the first `count` events.
    ///
    /// When `straddle` is given, the last of those events is cut in the same
    /// proportion as the event described by `straddle`.
    pub(crate) fn split_off_events(&mut self, count: usize, straddle: Option<Straddle>) -> Result<Track, ScoreError> {
        if count > self.events.len() {
            return Err(ScoreError::invariant(
                self.context(),
                format!("cannot split off {} of {} events", count, self.events.len()),
            ));
        }
        let mut head = self.events[..count].to_vec();
        let mut tail = self.events[count..].to_vec();

        if let Some(straddle) = straddle {
            let last = head.pop().ok_or_else(|| {
                ScoreError::invariant(self.context(), "no event to cut at the split point")
            })?;
            let total = last.duration_ms();
            if total < 2 {
                return Err(ScoreError::invariant(
                    self.context(),
                    format!("the {} at {}ms is too short to cut", last.kind(), last.position_ms()),
                ));
            }
            let ratio = straddle.before_ms as f64 / (straddle.before_ms + straddle.after_ms) as f64;
            let before_ms = ((total as f64 * ratio).round() as u32).clamp(1, total - 1);
            if last.is_chord() && !self.allows_cautionary_chord {
                return Err(ScoreError::ArgumentRange(format!(
                    "{} does not allow cautionary chords, so the chord at {}ms cannot be cut",
                    self.context(),
                    last.position_ms()
                )));
            }
            let (first, second) = last.split(before_ms, false)?;
            head.push(first);
            tail.insert(0, second);
        }

        let mut popped = self.empty_like();
        popped.events = head;
        popped.finalize();
        self.events = tail;
        self.finalize();
        Ok(popped)
    }

    /// Index of the event sounding at `position_ms`.
    pub fn index_at_position(&self, position_ms: u32) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.position_ms() <= position_ms && position_ms < e.end_ms())
    }

    /// Transpose chords and cautionary chords, clamping to the MIDI range.
    pub fn transpose(&mut self, semitones: i32) {
        for event in &mut self.events {
            match event {
                DurationEvent::Chord(chord) => chord.transpose(semitones),
                DurationEvent::CautionaryChord(cautionary) => {
                    for pitch in &mut cautionary.pitches {
                        *pitch = (*pitch as i32 + semitones).clamp(0, MIDI_MAX as i32) as u8;
                    }
                }
                DurationEvent::Rest(_) | DurationEvent::ClefChange(_) => {}
            }
        }
    }

    pub fn adjust_velocities(&mut self, factor: f64) -> Result<(), ScoreError> {
        if factor.is_nan() || factor <= 0.0 {
            return Err(ScoreError::ArgumentRange(format!(
                "velocity factor must be positive, got {}",
                factor
            )));
        }
        for event in &mut self.events {
            if let DurationEvent::Chord(chord) = event {
                chord.scale_velocities(factor);
            }
        }
        Ok(())
    }

    /// Ramp velocities linearly from `start_factor` at `begin_index` to
    /// `end_factor` at `end_index - 1`.
    pub fn adjust_velocities_hairpin(
        &mut self,
        begin_index: usize,
        end_index: usize,
        start_factor: f64,
        end_factor: f64,
    ) -> Result<(), ScoreError> {
        if begin_index >= end_index || end_index > self.events.len() {
            return Err(ScoreError::ArgumentRange(format!(
                "hairpin range {}..{} is invalid for {} ({} events)",
                begin_index,
                end_index,
                self.context(),
                self.events.len()
            )));
        }
        if start_factor.is_nan() || end_factor.is_nan() || start_factor <= 0.0 || end_factor <= 0.0 {
            return Err(ScoreError::ArgumentRange(
                "hairpin factors must be positive".to_string(),
            ));
        }
        let steps = (end_index - begin_index - 1).max(1) as f64;
        for (i, event) in self.events[begin_index..end_index].iter_mut().enumerate() {
            if let DurationEvent::Chord(chord) = event {
                let factor = start_factor + (end_factor - start_factor) * (i as f64 / steps);
                chord.scale_velocities(factor);
            }
        }
        Ok(())
    }

    /// Scale the duration of every chord. Rests keep their durations, so the
    /// track's duration changes.
    pub fn adjust_chord_durations(&mut self, factor: f64) -> Result<(), ScoreError> {
        if factor.is_nan() || factor <= 0.0 {
            return Err(ScoreError::ArgumentRange(format!(
                "duration factor must be positive, got {}",
                factor
            )));
        }
        for event in &mut self.events {
            if event.is_chord() {
                let scaled = (event.duration_ms() as f64 * factor).round() as u32;
                event.set_duration_ms(scaled.max(1));
            }
        }
        self.set_positions();
        Ok(())
    }

    pub fn insert_clef_change(&mut self, index: usize, clef: Clef) -> Result<(), ScoreError> {
        self.insert(index, DurationEvent::clef_change(clef))?;
        self.remove_duplicate_clef_changes();
        Ok(())
    }

    pub fn assert_consistency(&self) -> Result<(), ScoreError> {
        let mut expected_ms = 0;
        for (i, event) in self.events.iter().enumerate() {
            if event.position_ms() != expected_ms {
                return Err(ScoreError::invariant(
                    self.context(),
                    format!(
                        "event {} is at {}ms but the previous event ends at {}ms",
                        i,
                        event.position_ms(),
                        expected_ms
                    ),
                ));
            }
            match event {
                DurationEvent::ClefChange(_) if !self.allows_clef_change => {
                    return Err(ScoreError::invariant(
                        self.context(),
                        format!("clef change at index {} is not allowed here", i),
                    ));
                }
                DurationEvent::CautionaryChord(_) if !self.allows_cautionary_chord || i != 0 => {
                    return Err(ScoreError::invariant(
                        self.context(),
                        format!("cautionary chord at index {} is not allowed here", i),
                    ));
                }
                _ => {}
            }
            if !event.is_clef_change() && event.duration_ms() == 0 {
                return Err(ScoreError::invariant(
                    self.context(),
                    format!("{} at index {} lasts 0ms", event.kind(), i),
                ));
            }
            if i > 0 && event.is_rest() && self.events[i - 1].is_rest() {
                return Err(ScoreError::invariant(
                    self.context(),
                    format!("consecutive rests at index {}", i),
                ));
            }
            expected_ms = event.end_ms();
        }
        Ok(())
    }
}
