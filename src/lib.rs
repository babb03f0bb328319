pub mod bar;
pub mod block;
pub mod error;
pub mod event;
pub mod plan;
pub mod seq;
pub mod track;
pub mod track_group;
pub mod voice;
pub mod warp;

pub use bar::Bar;
pub use block::{Block, MainBlock};
pub use error::*;
pub use event::{CautionaryChordEvent, ChordEvent, Clef, ClefChangeEvent, DurationEvent, EventKind, RestEvent};
pub use plan::{parse_plan, ScorePlan};
pub use seq::Seq;
pub use track::Track;
pub use track_group::TrackGroup;
pub use voice::Voice;
pub use warp::{IdentityWarp, PositionWarp};

/// Build the bars of a YAML score plan.
/// This is the main entry point for the library.
pub fn build_bars(source: &str) -> Result<Vec<Bar>, ScoreError> {
    let plan = parse_plan(source)?;
    let snap = plan.snap_barlines_to_input_voices;
    let mut main = plan.into_main_block()?;
    if snap {
        main.adjust_barline_positions_for_input_voices()?;
    }
    main.convert_to_bars()
}

/// Serialize bars to YAML.
pub fn bars_to_yaml(bars: &[Bar]) -> Result<String, ScoreError> {
    serde_yaml::to_string(bars).map_err(|e| ScoreError::Serialization(e.to_string()))
}
