use log::{debug, trace};

use super::Block;
use crate::bar::Bar;
use crate::error::ScoreError;
use crate::track::{BoundaryClef, SplitPolicy};
use crate::voice::{check_voice_list, Voice};

impl Block {
    /// Cut the block into bars at its barlines.
    ///
    /// The final barline must be at the end of the block. A clef change
    /// exactly on a barline opens the following bar.
    pub fn convert_to_bars(self) -> Result<Vec<Bar>, ScoreError> {
        self.into_bars(BoundaryClef::After)
    }

    pub(crate) fn into_bars(mut self, boundary_clef: BoundaryClef) -> Result<Vec<Bar>, ScoreError> {
        let duration_ms = self.duration_ms();
        match self.barlines_ms.last() {
            None => {
                return Err(ScoreError::barline(0, format!("{} has no barlines", self.context())));
            }
            Some(&last_ms) if last_ms != duration_ms => {
                return Err(ScoreError::barline(
                    last_ms,
                    format!("final barline must equal the block duration ({}ms)", duration_ms),
                ));
            }
            Some(_) => {}
        }
        self.assert_consistency()?;

        debug!(
            "Converting {} ({}ms, {} voices) into {} bars",
            self.context(),
            duration_ms,
            self.voices.len(),
            self.barlines_ms.len()
        );
        let mut barlines_ms = std::mem::take(&mut self.barlines_ms);
        let mut bars = Vec::with_capacity(barlines_ms.len());
        while !barlines_ms.is_empty() {
            let bar_ms = barlines_ms.remove(0);
            for barline_ms in &mut barlines_ms {
                *barline_ms -= bar_ms;
            }
            let bar = self.pop_bar(bar_ms, boundary_clef)?;
            trace!(
                "Popped bar {} at {}ms lasting {}ms",
                bars.len() + 1,
                bar.abs_position_ms(),
                bar.duration_ms()
            );
            bars.push(bar);
        }
        debug_assert!(self.voices.is_empty());
        debug!("Block ends at {}ms after {} bars", self.abs_position_ms, bars.len());
        Ok(bars)
    }

    /// Split off the first `bar_ms` of every voice as a bar.
    fn pop_bar(&mut self, bar_ms: u32, boundary_clef: BoundaryClef) -> Result<Bar, ScoreError> {
        let remaining_ms = self.duration_ms();
        // nothing may be left behind after the final barline
        let boundary_clef = if bar_ms == remaining_ms {
            BoundaryClef::Before
        } else {
            boundary_clef
        };
        let policy = SplitPolicy {
            continue_cautionary: true,
            boundary_clef,
        };

        let mut popped: Vec<Voice> = Vec::with_capacity(self.voices.len());
        for voice in &mut self.voices {
            let before_ms = voice.duration_ms();
            let head = voice.split_off_at(bar_ms, policy)?;
            debug_assert_eq!(head.duration_ms() + voice.duration_ms(), before_ms);
            popped.push(head);
        }

        let bar = Bar::from_popped(self.abs_position_ms, popped)?;
        self.abs_position_ms += bar_ms;
        if self.voices.iter().all(|v| v.track().is_empty()) {
            self.voices.clear();
        } else {
            check_voice_list(&self.voices, &self.context())?;
        }
        Ok(bar)
    }
}
