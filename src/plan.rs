//! # Score Plans
//!
//! A score plan is a YAML document describing the blocks of a score: their
//! output tracks, input voices, clef changes and barlines. Plans are parsed
//! into `Raw*` structs, then validated into model types.
//!
//! ## Format
//! ```yaml
//! title: Example
//! clefs: [treble, bass]
//! snap-barlines-to-input-voices: false
//! blocks:
//!   - tracks:
//!       - channel: 0
//!         offset-ms: 0
//!         events:
//!           - { kind: chord, duration: 100, pitches: [60, 64], velocity: 80 }
//!           - { kind: rest, duration: 50 }
//!     input-voices:
//!       - channel: 0
//!         events: [ { kind: chord, duration: 150, pitches: [60] } ]
//!     clef-changes:
//!       - { channel: 1, position-ms: 100, clef: treble }
//!     transpose: 2
//!     velocity-factor: 0.9
//!     barlines: [150]
//! ```
//!
//! `clefs` holds one clef per output channel, so channels run from 0 to
//! `clefs.len() - 1`. A channel a block leaves out rests for the whole block.
//! Track offsets, clef change positions and barlines are all offsets from the
//! start of their block.

use serde::Deserialize;

use crate::block::{Block, MainBlock};
use crate::error::ScoreError;
use crate::event::{ChordEvent, Clef, DurationEvent};
use crate::seq::Seq;
use crate::track::Track;

/// Velocity of chords that give none.
pub const DEFAULT_VELOCITY: u8 = 64;

/// Raw plan for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RawPlan {
    pub title: Option<String>,
    #[serde(default)]
    pub clefs: Vec<String>,
    #[serde(default)]
    pub snap_barlines_to_input_voices: bool,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RawBlock {
    #[serde(default)]
    pub tracks: Vec<RawTrack>,
    #[serde(default)]
    pub input_voices: Vec<RawTrack>,
    #[serde(default)]
    pub clef_changes: Vec<RawClefChange>,
    pub transpose: Option<i32>,
    pub velocity_factor: Option<f64>,
    #[serde(default)]
    pub barlines: Vec<u32>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct RawTrack {
    pub channel: u8,
    #[serde(default)]
    pub offset_ms: u32,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RawEvent {
    Chord {
        duration: u32,
        pitches: Vec<u8>,
        velocity: Option<u8>,
        velocities: Option<Vec<u8>>,
    },
    Rest {
        duration: u32,
    },
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct RawClefChange {
    pub channel: u8,
    pub position_ms: u32,
    pub clef: String,
}

/// A validated score plan.
#[derive(Debug, Clone)]
pub struct ScorePlan {
    pub title: Option<String>,
    pub clefs: Vec<Clef>,
    pub snap_barlines_to_input_voices: bool,
    pub blocks: Vec<BlockPlan>,
}

#[derive(Debug, Clone)]
pub struct BlockPlan {
    pub tracks: Vec<Track>,
    pub input_voices: Vec<Track>,
    pub clef_changes: Vec<ClefChangePlan>,
    pub transpose: i32,
    pub velocity_factor: Option<f64>,
    pub barlines_ms: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClefChangePlan {
    pub channel: u8,
    pub position_ms: u32,
    pub clef: Clef,
}

/// Parse and validate a YAML score plan.
pub fn parse_plan(source: &str) -> Result<ScorePlan, ScoreError> {
    let raw: RawPlan = serde_yaml::from_str(source).map_err(|e| ScoreError::PlanError(e.to_string()))?;

    if raw.clefs.is_empty() {
        return Err(ScoreError::PlanError(
            "a plan needs at least one clef".to_string(),
        ));
    }
    let clefs = raw
        .clefs
        .iter()
        .map(|name| {
            Clef::from_name(name).ok_or_else(|| ScoreError::PlanError(format!("Invalid clef: {}", name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut blocks = Vec::with_capacity(raw.blocks.len());
    for (index, raw_block) in raw.blocks.into_iter().enumerate() {
        blocks.push(parse_block(index, raw_block, clefs.len())?);
    }

    Ok(ScorePlan {
        title: raw.title,
        clefs,
        snap_barlines_to_input_voices: raw.snap_barlines_to_input_voices,
        blocks,
    })
}

fn parse_block(index: usize, raw: RawBlock, channel_count: usize) -> Result<BlockPlan, ScoreError> {
    let context = format!("block {}", index);
    if raw.tracks.is_empty() {
        return Err(ScoreError::PlanError(format!("{} has no tracks", context)));
    }

    let mut tracks = Vec::with_capacity(raw.tracks.len());
    for raw_track in raw.tracks {
        if raw_track.channel as usize >= channel_count {
            return Err(ScoreError::PlanError(format!(
                "{}: track channel {} has no clef",
                context, raw_track.channel
            )));
        }
        tracks.push(parse_track(&context, raw_track)?);
    }
    let mut input_voices = Vec::with_capacity(raw.input_voices.len());
    for raw_track in raw.input_voices {
        input_voices.push(parse_track(&context, raw_track)?);
    }

    let clef_changes = raw
        .clef_changes
        .into_iter()
        .map(|change| {
            let clef = Clef::from_name(&change.clef)
                .ok_or_else(|| ScoreError::PlanError(format!("{}: Invalid clef: {}", context, change.clef)))?;
            Ok(ClefChangePlan {
                channel: change.channel,
                position_ms: change.position_ms,
                clef,
            })
        })
        .collect::<Result<Vec<_>, ScoreError>>()?;

    Ok(BlockPlan {
        tracks,
        input_voices,
        clef_changes,
        transpose: raw.transpose.unwrap_or(0),
        velocity_factor: raw.velocity_factor,
        barlines_ms: raw.barlines,
    })
}

fn parse_track(context: &str, raw: RawTrack) -> Result<Track, ScoreError> {
    let channel = raw.channel;
    let located = |e: ScoreError| ScoreError::PlanError(format!("{}, channel {}: {}", context, channel, e));

    let mut events = Vec::with_capacity(raw.events.len());
    for raw_event in raw.events {
        let event = match raw_event {
            RawEvent::Chord {
                duration,
                pitches,
                velocity,
                velocities,
            } => {
                let velocities = match (velocity, velocities) {
                    (Some(_), Some(_)) => {
                        return Err(located(ScoreError::ArgumentRange(
                            "a chord gives either velocity or velocities, not both".to_string(),
                        )));
                    }
                    (_, Some(velocities)) => velocities,
                    (velocity, None) => vec![velocity.unwrap_or(DEFAULT_VELOCITY); pitches.len()],
                };
                DurationEvent::from(ChordEvent::new(duration, pitches, velocities).map_err(located)?)
            }
            RawEvent::Rest { duration } => DurationEvent::rest(duration),
        };
        events.push(event);
    }
    if events.is_empty() {
        return Err(ScoreError::PlanError(format!(
            "{}, channel {}: track has no events",
            context, channel
        )));
    }
    Ok(Track::new(channel, events).map_err(located)?.with_offset(raw.offset_ms))
}

impl BlockPlan {
    /// Build the block, giving every channel without a track a rest.
    pub fn into_block(self, channel_count: usize) -> Result<Block, ScoreError> {
        let duration_ms = self
            .tracks
            .iter()
            .map(Track::end_ms_re_container)
            .max()
            .unwrap_or(0);
        let mut tracks = self.tracks;
        // offsets count from the block start, even when every track shares one
        for track in &mut tracks {
            let offset_ms = track.position_ms_re_container();
            if offset_ms > 0 {
                track.insert(0, DurationEvent::rest(offset_ms))?;
                track.set_position_ms_re_container(0);
            }
        }
        for channel in (0u8..).take(channel_count) {
            if !tracks.iter().any(|t| t.channel() == channel) {
                tracks.push(Track::new(channel, vec![DurationEvent::rest(duration_ms)])?);
            }
        }
        tracks.sort_by_key(Track::channel);

        let mut block = Block::from_seq(Seq::new(0, tracks)?)?;
        if self.transpose != 0 {
            block.transpose(self.transpose);
        }
        if let Some(factor) = self.velocity_factor {
            block.adjust_velocities(factor)?;
        }
        for track in self.input_voices {
            block.add_input_voice(track)?;
        }
        if !self.barlines_ms.is_empty() {
            block.set_barlines(self.barlines_ms)?;
        }
        Ok(block)
    }
}

impl ScorePlan {
    /// Build the main block: seed it with the plan's clefs, then append each
    /// block and apply its clef changes.
    ///
    /// Barlines are not snapped here, see
    /// [`MainBlock::adjust_barline_positions_for_input_voices`].
    pub fn into_main_block(self) -> Result<MainBlock, ScoreError> {
        let channel_count = self.clefs.len();
        let mut main = MainBlock::new(&self.clefs)?;
        for plan in self.blocks {
            let start_ms = main.duration_ms();
            let clef_changes = plan.clef_changes.clone();
            main.concat(plan.into_block(channel_count)?)?;
            for change in clef_changes {
                main.insert_clef_change(change.channel, start_ms + change.position_ms, change.clef)?;
            }
        }
        Ok(main)
    }
}
