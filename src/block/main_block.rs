use std::collections::BTreeSet;

use log::{debug, warn};

use super::Block;
use crate::bar::Bar;
use crate::error::ScoreError;
use crate::event::{Clef, DurationEvent};
use crate::track::{BoundaryClef, Track};
use crate::voice::{Voice, MAX_OUTPUT_CHANNEL};

/// The block spanning a whole score.
///
/// Created empty, with one output voice per channel holding only that
/// channel's initial clef. Content arrives by appending blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct MainBlock {
    block: Block,
}

impl MainBlock {
    /// One output voice per clef, on channels 0, 1, 2...
    pub fn new(initial_clefs: &[Clef]) -> Result<Self, ScoreError> {
        let max_channels = MAX_OUTPUT_CHANNEL as usize + 1;
        if initial_clefs.is_empty() || initial_clefs.len() > max_channels {
            return Err(ScoreError::ArgumentRange(format!(
                "a main block needs between 1 and {} clefs, got {}",
                max_channels,
                initial_clefs.len()
            )));
        }
        let mut voices = Vec::with_capacity(initial_clefs.len());
        for (channel, &clef) in (0u8..).zip(initial_clefs) {
            let mut track = Track::empty(channel);
            track.set_permissions(true, true)?;
            track.add(DurationEvent::clef_change(clef))?;
            voices.push(Voice::output(track)?);
        }
        Ok(Self {
            block: Block::from_voices(0, voices)?,
        })
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn duration_ms(&self) -> u32 {
        self.block.duration_ms()
    }

    pub fn barline_positions(&self) -> &[u32] {
        self.block.barline_positions()
    }

    pub fn concat(&mut self, block: Block) -> Result<(), ScoreError> {
        self.block.concat(block)
    }

    pub fn add_input_voice(&mut self, track: Track) -> Result<(), ScoreError> {
        self.block.add_input_voice(track)
    }

    pub fn set_barlines(&mut self, barlines_ms: Vec<u32>) -> Result<(), ScoreError> {
        self.block.set_barlines(barlines_ms)
    }

    pub fn insert_clef_change(&mut self, channel: u8, position_ms: u32, clef: Clef) -> Result<(), ScoreError> {
        self.block.insert_clef_change(channel, position_ms, clef)
    }

    /// Move each barline to the closest end of an input voice event.
    ///
    /// Ties go to the earlier position. Barlines that land on the position
    /// of the barline before them are dropped. Does nothing when there are
    /// no input voices.
    pub fn adjust_barline_positions_for_input_voices(&mut self) -> Result<(), ScoreError> {
        let ends: BTreeSet<u32> = self
            .block
            .input_tracks()
            .flat_map(|track| track.events().iter().map(DurationEvent::end_ms))
            .filter(|&end| end > 0)
            .collect();
        if ends.is_empty() {
            debug!("No input voices, barlines left where they are");
            return Ok(());
        }

        let mut adjusted: Vec<u32> = Vec::with_capacity(self.block.barlines_ms.len());
        for &barline_ms in &self.block.barlines_ms {
            let below = ends.range(..=barline_ms).next_back().copied();
            let above = ends.range(barline_ms..).next().copied();
            let snapped = match (below, above) {
                (Some(b), Some(a)) if a - barline_ms < barline_ms - b => a,
                (Some(b), _) => b,
                (None, Some(a)) => a,
                (None, None) => barline_ms,
            };
            if snapped != barline_ms {
                debug!("Barline at {}ms snapped to input voice event end at {}ms", barline_ms, snapped);
            }
            if adjusted.last() == Some(&snapped) {
                warn!(
                    "Barline at {}ms collapsed onto the barline at {}ms and was dropped",
                    barline_ms, snapped
                );
                continue;
            }
            adjusted.push(snapped);
        }
        self.block.set_barlines(adjusted)
    }

    /// Cut the score into bars. A clef change exactly on a barline closes
    /// the bar before it.
    pub fn convert_to_bars(self) -> Result<Vec<Bar>, ScoreError> {
        self.block.into_bars(BoundaryClef::Before)
    }
}
