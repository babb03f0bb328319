use super::*;
use crate::bar::Bar;
use crate::event::{ChordEvent, Clef, DurationEvent, EventKind};
use crate::seq::Seq;
use crate::track::Track;
use pretty_assertions::assert_eq;

fn chord(duration_ms: u32, pitch: u8) -> DurationEvent {
    ChordEvent::with_velocity(duration_ms, vec![pitch], 80).unwrap().into()
}

fn block_of(tracks: Vec<Track>) -> Block {
    Block::from_seq(Seq::new(0, tracks).unwrap()).unwrap()
}

fn durations(track: &Track) -> Vec<u32> {
    track.events().iter().map(DurationEvent::duration_ms).collect()
}

fn kinds(track: &Track) -> Vec<EventKind> {
    track.events().iter().map(DurationEvent::kind).collect()
}

fn first_output(bar: &Bar) -> &Track {
    bar.output_tracks().next().unwrap()
}

#[test]
fn test_chord_ending_on_barline_is_not_cut() {
    let mut block = block_of(vec![Track::new(0, vec![chord(100, 60), chord(200, 62)]).unwrap()]);
    block.set_barlines(vec![100, 300]).unwrap();
    let bars = block.convert_to_bars().unwrap();

    assert_eq!(bars.len(), 2);
    match &first_output(&bars[0]).events()[..] {
        [DurationEvent::Chord(c)] => {
            assert_eq!(c.duration_ms, 100);
            assert_eq!(
                c.duration_to_next_barline_ms, None,
                "a chord ending exactly on a barline is not cut, so it records no span to the barline"
            );
        }
        other => panic!("Expected a single chord but got: {:?}", other),
    }
    match &first_output(&bars[1]).events()[..] {
        [DurationEvent::Chord(c)] => {
            assert_eq!(c.duration_ms, 200);
            assert_eq!(c.pitches, vec![62]);
            assert_eq!(
                c.duration_to_next_barline_ms, None,
                "a chord ending exactly on the final barline is not cut"
            );
        }
        other => panic!("Expected a single chord but got: {:?}", other),
    }
    assert_eq!(bars[1].abs_position_ms(), 100);
}

#[test]
fn test_chord_straddling_several_barlines() {
    let mut block = block_of(vec![Track::new(0, vec![chord(250, 67)]).unwrap()]);
    block.set_barlines(vec![100, 200, 250]).unwrap();
    let bars = block.convert_to_bars().unwrap();
    assert_eq!(bars.len(), 3);

    match &first_output(&bars[0]).events()[0] {
        DurationEvent::Chord(c) => {
            assert_eq!(c.duration_ms, 250);
            assert_eq!(c.duration_to_next_barline_ms, Some(100));
        }
        other => panic!("Expected chord but got: {:?}", other),
    }
    for (bar, expected_ms) in bars[1..].iter().zip([100, 50]) {
        match &first_output(bar).events()[..] {
            [DurationEvent::CautionaryChord(c)] => {
                assert_eq!(c.duration_ms, expected_ms);
                assert_eq!(c.pitches, vec![67]);
            }
            other => panic!("Expected a single cautionary chord but got: {:?}", other),
        }
    }
    let positions: Vec<u32> = bars.iter().map(Bar::abs_position_ms).collect();
    assert_eq!(positions, vec![0, 100, 200]);
}

#[test]
fn test_straddling_rest_is_split() {
    let mut block = block_of(vec![Track::new(
        0,
        vec![chord(50, 60), DurationEvent::rest(200), chord(50, 60)],
    )
    .unwrap()]);
    block.set_barlines(vec![150, 300]).unwrap();
    let bars = block.convert_to_bars().unwrap();

    assert_eq!(durations(first_output(&bars[0])), vec![50, 100]);
    assert_eq!(kinds(first_output(&bars[0])), vec![EventKind::Chord, EventKind::Rest]);
    assert_eq!(durations(first_output(&bars[1])), vec![100, 50]);
    assert_eq!(kinds(first_output(&bars[1])), vec![EventKind::Rest, EventKind::Chord]);
}

#[test]
fn test_convert_to_bars_conserves_duration() {
    let mut block = block_of(vec![
        Track::new(0, vec![chord(120, 60), DurationEvent::rest(80), chord(300, 64)]).unwrap(),
        Track::new(1, vec![chord(200, 48), chord(100, 50)]).unwrap().with_offset(60),
    ]);
    block
        .add_input_voice(Track::new(2, vec![chord(250, 72), chord(250, 74)]).unwrap())
        .unwrap();
    assert_eq!(block.duration_ms(), 500);
    block.set_barlines(vec![90, 210, 333, 500]).unwrap();
    let bars = block.convert_to_bars().unwrap();

    let bar_durations: Vec<u32> = bars.iter().map(Bar::duration_ms).collect();
    assert_eq!(bar_durations, vec![90, 120, 123, 167]);
    let positions: Vec<u32> = bars.iter().map(Bar::abs_position_ms).collect();
    assert_eq!(positions, vec![0, 90, 210, 333]);

    for bar in &bars {
        assert!(bar.assert_consistency().is_ok());
        assert_eq!(bar.voices().len(), 3);
        for voice in bar.voices() {
            assert_eq!(voice.duration_ms(), bar.duration_ms());
            let cautionaries = voice.track().events().iter().filter(|e| e.is_cautionary()).count();
            assert!(cautionaries <= 1);
        }
    }
    for index in 0..3 {
        let total: u32 = bars.iter().map(|b| b.voices()[index].duration_ms()).sum();
        assert_eq!(total, 500);
    }

    // the second output voice is cut inside its first and second chords
    let second: Vec<&Track> = bars.iter().map(|b| b.voices()[1].track()).collect();
    assert_eq!(kinds(second[1]), vec![EventKind::CautionaryChord]);
    assert_eq!(kinds(second[2]), vec![EventKind::CautionaryChord, EventKind::Chord]);
    assert_eq!(kinds(second[3]), vec![EventKind::CautionaryChord, EventKind::Rest]);
    assert_eq!(durations(second[3]), vec![27, 140]);
}

#[test]
fn test_fifth_input_voice_is_rejected_before_mutation() {
    let mut block = block_of(vec![Track::new(0, vec![chord(400, 60)]).unwrap()]);
    for channel in 0..4 {
        block
            .add_input_voice(Track::new(channel, vec![chord(100, 60)]).unwrap())
            .unwrap();
    }
    let before = block.clone();

    let result = block.add_input_voice(Track::new(3, vec![chord(900, 60)]).unwrap());
    assert!(matches!(result, Err(ScoreError::ArgumentRange(_))));
    assert_eq!(block, before);
}

#[test]
fn test_input_voice_channel_checks() {
    let mut block = block_of(vec![Track::new(0, vec![chord(400, 60)]).unwrap()]);
    let result = block.add_input_voice(Track::new(4, vec![chord(100, 60)]).unwrap());
    assert!(matches!(result, Err(ScoreError::ArgumentRange(_))));

    block.add_input_voice(Track::new(1, vec![chord(100, 60)]).unwrap()).unwrap();
    let result = block.add_input_voice(Track::new(1, vec![chord(100, 60)]).unwrap());
    assert!(matches!(result, Err(ScoreError::ArgumentRange(_))));
    assert_eq!(block.input_tracks().count(), 1);
}

#[test]
fn test_input_voice_offset_and_growth() {
    let mut block = block_of(vec![Track::new(0, vec![chord(200, 60)]).unwrap()]);
    block
        .add_input_voice(Track::new(0, vec![chord(100, 60)]).unwrap().with_offset(150))
        .unwrap();

    assert_eq!(block.duration_ms(), 250);
    let input = block.input_tracks().next().unwrap();
    assert_eq!(durations(input), vec![150, 100]);
    assert_eq!(input.position_ms_re_container(), 0);
    assert_eq!(durations(block.output_tracks().next().unwrap()), vec![200, 50]);
    assert!(block.assert_consistency().is_ok());
}

#[test]
fn test_invalid_barlines() {
    let mut block = block_of(vec![Track::new(0, vec![chord(300, 60)]).unwrap()]);
    for barlines in [vec![200, 100], vec![0, 300], vec![100, 100, 300], vec![100, 301]] {
        let result = block.set_barlines(barlines);
        assert!(matches!(result, Err(ScoreError::InvalidBarlinePlacement { .. })));
    }
    assert!(block.barline_positions().is_empty());

    let result = block.clone().convert_to_bars();
    assert!(matches!(result, Err(ScoreError::InvalidBarlinePlacement { .. })));

    block.set_barlines(vec![100, 200]).unwrap();
    match block.convert_to_bars() {
        Err(ScoreError::InvalidBarlinePlacement { position_ms, .. }) => assert_eq!(position_ms, 200),
        other => panic!("Expected invalid barline but got: {:?}", other),
    }
}

#[test]
fn test_add_barline_appends_in_order() {
    let mut block = block_of(vec![Track::new(0, vec![chord(300, 60)]).unwrap()]);
    block.add_barline(100).unwrap();
    block.add_barline(300).unwrap();
    assert!(block.add_barline(250).is_err());
    assert_eq!(block.barline_positions(), &[100, 300]);
}

#[test]
fn test_clef_on_barline_opens_next_bar_in_block() {
    let mut block = block_of(vec![Track::new(0, vec![chord(100, 60), chord(100, 40)]).unwrap()]);
    block.insert_clef_change(0, 100, Clef::Bass).unwrap();
    block.set_barlines(vec![100, 200]).unwrap();
    let bars = block.convert_to_bars().unwrap();

    assert_eq!(kinds(first_output(&bars[0])), vec![EventKind::Chord]);
    assert_eq!(
        kinds(first_output(&bars[1])),
        vec![EventKind::ClefChange, EventKind::Chord]
    );
}

#[test]
fn test_clef_on_barline_closes_previous_bar_in_main_block() {
    let mut main = MainBlock::new(&[Clef::Treble]).unwrap();
    main.concat(block_of(vec![Track::new(0, vec![chord(100, 60), chord(100, 40)]).unwrap()]))
        .unwrap();
    main.insert_clef_change(0, 100, Clef::Bass).unwrap();
    main.set_barlines(vec![100, 200]).unwrap();
    let bars = main.convert_to_bars().unwrap();

    assert_eq!(
        kinds(first_output(&bars[0])),
        vec![EventKind::ClefChange, EventKind::Chord, EventKind::ClefChange]
    );
    assert_eq!(kinds(first_output(&bars[1])), vec![EventKind::Chord]);
}

#[test]
fn test_trailing_clef_stays_in_last_bar() {
    let mut block = block_of(vec![Track::new(0, vec![chord(100, 60)]).unwrap()]);
    block.insert_clef_change(0, 100, Clef::Alto).unwrap();
    block.set_barlines(vec![100]).unwrap();
    let bars = block.convert_to_bars().unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(
        kinds(first_output(&bars[0])),
        vec![EventKind::Chord, EventKind::ClefChange]
    );
}

#[test]
fn test_insert_clef_change_needs_event_boundary() {
    let mut block = block_of(vec![Track::new(0, vec![chord(100, 60), chord(100, 40)]).unwrap()]);
    assert!(matches!(
        block.insert_clef_change(0, 50, Clef::Bass),
        Err(ScoreError::ArgumentRange(_))
    ));
    assert!(matches!(
        block.insert_clef_change(5, 100, Clef::Bass),
        Err(ScoreError::ArgumentRange(_))
    ));
}

#[test]
fn test_main_block_starts_with_clefs() {
    let main = MainBlock::new(&[Clef::Treble, Clef::Bass]).unwrap();
    assert_eq!(main.duration_ms(), 0);
    assert_eq!(main.block().voices().len(), 2);
    for track in main.block().output_tracks() {
        assert_eq!(kinds(track), vec![EventKind::ClefChange]);
    }
    assert!(MainBlock::new(&[]).is_err());
    assert!(MainBlock::new(&[Clef::Treble; 17]).is_err());
}

#[test]
fn test_barlines_snap_to_input_voice_event_ends() {
    let mut main = MainBlock::new(&[Clef::Treble]).unwrap();
    main.concat(block_of(vec![Track::new(0, vec![chord(400, 60)]).unwrap()]))
        .unwrap();
    main.add_input_voice(Track::new(0, vec![chord(130, 60), chord(170, 62), chord(100, 64)]).unwrap())
        .unwrap();
    main.set_barlines(vec![100, 250, 320, 400]).unwrap();
    main.adjust_barline_positions_for_input_voices().unwrap();
    assert_eq!(main.barline_positions(), &[130, 300, 400]);

    let bars = main.convert_to_bars().unwrap();
    let bar_durations: Vec<u32> = bars.iter().map(Bar::duration_ms).collect();
    assert_eq!(bar_durations, vec![130, 170, 100]);
    for bar in &bars {
        let input = bar.input_tracks().next().unwrap();
        assert_eq!(kinds(input), vec![EventKind::Chord]);
    }
}

#[test]
fn test_snapping_without_input_voices_changes_nothing() {
    let mut main = MainBlock::new(&[Clef::Bass]).unwrap();
    main.concat(block_of(vec![Track::new(0, vec![chord(400, 40)]).unwrap()]))
        .unwrap();
    main.set_barlines(vec![150, 400]).unwrap();
    main.adjust_barline_positions_for_input_voices().unwrap();
    assert_eq!(main.barline_positions(), &[150, 400]);
}

#[test]
fn test_concat_aligns_input_voices_and_shifts_barlines() {
    let mut first = block_of(vec![
        Track::new(0, vec![chord(300, 60)]).unwrap(),
        Track::new(1, vec![chord(300, 48)]).unwrap(),
    ]);
    first.add_input_voice(Track::new(0, vec![chord(300, 60)]).unwrap()).unwrap();
    first.set_barlines(vec![100, 300]).unwrap();

    let mut second = block_of(vec![
        Track::new(0, vec![chord(200, 62)]).unwrap(),
        Track::new(1, vec![chord(200, 50)]).unwrap(),
    ]);
    second.add_input_voice(Track::new(1, vec![chord(150, 62)]).unwrap()).unwrap();
    second.set_barlines(vec![200]).unwrap();

    first.concat(second).unwrap();
    assert_eq!(first.duration_ms(), 500);
    assert_eq!(first.barline_positions(), &[100, 300, 500]);
    let inputs: Vec<&Track> = first.input_tracks().collect();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0].channel(), 0);
    assert_eq!(durations(inputs[0]), vec![300, 200]);
    assert_eq!(inputs[1].channel(), 1);
    assert_eq!(durations(inputs[1]), vec![300, 150, 50]);
    assert!(first.assert_consistency().is_ok());

    let bars = first.convert_to_bars().unwrap();
    assert_eq!(bars.len(), 3);
    assert!(bars.iter().all(|b| b.voices().len() == 4));
}

#[test]
fn test_concat_rejects_other_output_channels() {
    let mut first = block_of(vec![Track::new(0, vec![chord(300, 60)]).unwrap()]);
    let second = block_of(vec![Track::new(1, vec![chord(300, 60)]).unwrap()]);
    let before = first.clone();
    assert!(matches!(first.concat(second), Err(ScoreError::ArgumentRange(_))));
    assert_eq!(first, before);
}

#[test]
fn test_bars_rejoin_into_the_original_track() {
    let original = Track::new(0, vec![chord(250, 67), DurationEvent::rest(30), chord(120, 69)]).unwrap();
    let mut block = block_of(vec![original.clone()]);
    block.set_barlines(vec![100, 200, 300, 400]).unwrap();
    let mut bars = block.convert_to_bars().unwrap().into_iter();

    let mut joined = bars.next().unwrap();
    for bar in bars {
        joined.concat(bar).unwrap();
    }
    assert_eq!(first_output(&joined).events(), original.events());
}
