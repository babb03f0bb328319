//! Integration tests for scoreblock
//!
//! Tests the full pipeline from a YAML score plan to bars.

use scoreblock::{
    bars_to_yaml, build_bars, Bar, ChordEvent, DurationEvent, EventKind, ScoreError, Seq, Track, TrackGroup,
};

fn kinds(track: &Track) -> Vec<EventKind> {
    track.events().iter().map(DurationEvent::kind).collect()
}

const TWO_BLOCKS: &str = r#"
title: Two Blocks
clefs: [treble, bass]
blocks:
  - tracks:
      - channel: 0
        events:
          - { kind: chord, duration: 250, pitches: [60, 64], velocity: 90 }
          - { kind: rest, duration: 50 }
      - channel: 1
        events:
          - { kind: rest, duration: 100 }
          - { kind: chord, duration: 200, pitches: [40] }
    barlines: [100, 300]
  - tracks:
      - channel: 0
        events:
          - { kind: chord, duration: 300, pitches: [62] }
    barlines: [150, 300]
"#;

#[test]
fn test_build_bars_from_two_blocks() {
    let bars = build_bars(TWO_BLOCKS).unwrap();
    assert_eq!(bars.len(), 4);

    let positions: Vec<u32> = bars.iter().map(Bar::abs_position_ms).collect();
    assert_eq!(positions, vec![0, 100, 300, 450]);
    let durations: Vec<u32> = bars.iter().map(Bar::duration_ms).collect();
    assert_eq!(durations, vec![100, 200, 150, 150]);

    let treble: Vec<&Track> = bars.iter().map(|b| b.output_tracks().next().unwrap()).collect();
    assert_eq!(kinds(treble[0]), vec![EventKind::ClefChange, EventKind::Chord]);
    assert_eq!(kinds(treble[1]), vec![EventKind::CautionaryChord, EventKind::Rest]);
    assert_eq!(kinds(treble[2]), vec![EventKind::Chord]);
    assert_eq!(kinds(treble[3]), vec![EventKind::CautionaryChord]);

    let bass: Vec<&Track> = bars.iter().map(|b| b.output_tracks().nth(1).unwrap()).collect();
    assert_eq!(kinds(bass[0]), vec![EventKind::ClefChange, EventKind::Rest]);
    assert_eq!(kinds(bass[1]), vec![EventKind::Chord]);
    assert_eq!(kinds(bass[3]), vec![EventKind::Rest]);

    for bar in &bars {
        assert!(bar.assert_consistency().is_ok());
    }
}

#[test]
fn test_bars_to_yaml() {
    let bars = build_bars(TWO_BLOCKS).unwrap();
    let yaml = bars_to_yaml(&bars).unwrap();
    assert!(yaml.contains("kind: cautionary-chord"));
    assert!(yaml.contains("durationToNextBarlineMs: 100"));
    assert!(yaml.contains("clef: bass"));
    assert!(yaml.contains("absPositionMs: 450"));
}

#[test]
fn test_build_bars_snaps_barlines_to_input_voices() {
    let source = r#"
clefs: [treble]
snap-barlines-to-input-voices: true
blocks:
  - tracks:
      - channel: 0
        events: [ { kind: chord, duration: 400, pitches: [67] } ]
    input-voices:
      - channel: 1
        events:
          - { kind: chord, duration: 130, pitches: [60] }
          - { kind: chord, duration: 170, pitches: [62] }
          - { kind: chord, duration: 100, pitches: [64] }
    barlines: [100, 250, 400]
"#;
    let bars = build_bars(source).unwrap();
    let durations: Vec<u32> = bars.iter().map(Bar::duration_ms).collect();
    assert_eq!(durations, vec![130, 170, 100]);
    for bar in &bars {
        let input = bar.input_tracks().next().unwrap();
        assert_eq!(input.channel(), 1);
        assert_eq!(kinds(input), vec![EventKind::Chord]);
    }
}

#[test]
fn test_build_bars_applies_transpose_and_velocity_factor() {
    let source = r#"
clefs: [treble]
blocks:
  - tracks:
      - channel: 0
        events: [ { kind: chord, duration: 100, pitches: [60], velocity: 100 } ]
    transpose: 12
    velocity-factor: 0.5
    barlines: [100]
"#;
    let bars = build_bars(source).unwrap();
    let track = bars[0].output_tracks().next().unwrap();
    match &track.events()[1] {
        DurationEvent::Chord(c) => {
            assert_eq!(c.pitches, vec![72]);
            assert_eq!(c.velocities, vec![50]);
        }
        other => panic!("Expected chord but got: {:?}", other),
    }
}

#[test]
fn test_block_offset_delays_every_track() {
    let source = r#"
clefs: [treble, bass]
blocks:
  - tracks:
      - channel: 0
        offset-ms: 50
        events: [ { kind: chord, duration: 100, pitches: [60] } ]
      - channel: 1
        offset-ms: 50
        events: [ { kind: chord, duration: 100, pitches: [40] } ]
    barlines: [50, 150]
"#;
    let bars = build_bars(source).unwrap();
    let positions: Vec<u32> = bars.iter().map(Bar::abs_position_ms).collect();
    assert_eq!(positions, vec![0, 50]);
    for track in bars[0].output_tracks() {
        assert_eq!(kinds(track), vec![EventKind::ClefChange, EventKind::Rest]);
    }
    for track in bars[1].output_tracks() {
        assert_eq!(kinds(track), vec![EventKind::Chord]);
    }
}

#[test]
fn test_final_barline_must_end_the_score() {
    let source = r#"
clefs: [treble]
blocks:
  - tracks:
      - channel: 0
        events: [ { kind: chord, duration: 300, pitches: [60] } ]
    barlines: [100]
"#;
    match build_bars(source) {
        Err(ScoreError::InvalidBarlinePlacement { position_ms, .. }) => assert_eq!(position_ms, 100),
        other => panic!("Expected invalid barline but got: {:?}", other),
    }
}

#[test]
fn test_invalid_plan_is_reported() {
    let result = build_bars("clefs: [treble]\nblocks:\n  - tracks: []\n");
    assert!(matches!(result, Err(ScoreError::PlanError(_))));
}

#[test]
fn test_plan_longer_than_u32_is_reported() {
    let source = r#"
clefs: [treble]
blocks:
  - tracks:
      - channel: 0
        events:
          - { kind: rest, duration: 3000000000 }
          - { kind: rest, duration: 3000000000 }
    barlines: [3000000000]
"#;
    match build_bars(source) {
        Err(ScoreError::PlanError(message)) => assert!(message.contains("longer than"), "{}", message),
        other => panic!("Expected plan error but got: {:?}", other),
    }
}

#[test]
fn test_bar_time_warp_with_custom_curve() {
    let chord = |duration_ms| -> DurationEvent { ChordEvent::with_velocity(duration_ms, vec![60], 80).unwrap().into() };
    let seq = Seq::new(0, vec![Track::new(0, vec![chord(100), chord(100), chord(100)]).unwrap()]).unwrap();
    let mut bar = Bar::from_seq(seq, vec![]).unwrap();

    // push inner boundaries later in proportion to the distortion
    let curve = |positions: &[u32], distortion: f64| -> Vec<u32> {
        let last = positions.len() - 1;
        positions
            .iter()
            .enumerate()
            .map(|(i, &p)| if i == 0 || i == last { p } else { p + distortion as u32 })
            .collect()
    };
    bar.time_warp(&curve, 20.0).unwrap();

    let track = bar.output_tracks().next().unwrap();
    let durations: Vec<u32> = track.events().iter().map(DurationEvent::duration_ms).collect();
    assert_eq!(durations, vec![120, 100, 80]);
    assert_eq!(bar.duration_ms(), 300);
}

#[test]
fn test_track_group_pop() {
    let make = |channel| {
        Track::new(
            channel,
            vec![
                ChordEvent::with_velocity(100, vec![60], 80).unwrap().into(),
                DurationEvent::rest(50),
                ChordEvent::with_velocity(150, vec![64], 80).unwrap().into(),
            ],
        )
        .unwrap()
    };
    let mut group = TrackGroup::new(vec![make(0), make(1)]).unwrap();
    let popped = group.pop(120).unwrap();
    for (head, tail) in popped.tracks().iter().zip(group.tracks()) {
        assert_eq!(kinds(head), vec![EventKind::Chord, EventKind::Rest]);
        assert_eq!(kinds(tail), vec![EventKind::Rest, EventKind::Chord]);
        assert_eq!(head.duration_ms() + tail.duration_ms(), 300);
    }
}
