use anyhow::Result;
use key_tracker::{
    analyze, AnalyzerConfig, ChordRootRule, Error, Key, ModulationType, Note, Piece,
    SlidingWindowTracker, StabilityClass, TempoChange, TimeSignatureChange, WindowingMode,
};
use pretty_assertions::assert_eq;

const C_MAJOR: &[u8] = &[48, 52, 55]; // C3 E3 G3
const A_MINOR: &[u8] = &[45, 48, 52]; // A2 C3 E3

/// One triad per second over `from..to`.
fn block(chord: &[u8], from: u32, to: u32) -> Vec<Note> {
    (from..to)
        .flat_map(|t| {
            chord
                .iter()
                .map(move |&p| Note::new(p, t as f64, t as f64 + 1.0, 100))
        })
        .collect()
}

fn c_then_a_minor(seconds_each: u32) -> Vec<Note> {
    let mut notes = block(C_MAJOR, 0, seconds_each);
    notes.extend(block(A_MINOR, seconds_each, seconds_each * 2));
    notes
}

#[test]
fn two_chord_piece_modulates_to_relative_minor() -> Result<()> {
    let piece = Piece::new(c_then_a_minor(4))?;
    let timeline = analyze(&piece, AnalyzerConfig::default())?;

    assert_eq!(timeline.mode, WindowingMode::FixedDuration);
    let keys: Vec<_> = timeline.points.iter().map(|p| p.key).collect();
    let c = Key::major(0);
    let a = Key::minor(9);
    assert_eq!(keys, vec![c, c, c, c, a, a, a]);

    let times: Vec<_> = timeline.points.iter().map(|p| p.time).collect();
    assert_eq!(times, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    assert!(timeline.points.iter().all(|p| p.confidence >= 0.65));
    assert!(timeline.points.iter().all(|p| !p.smoothed));

    assert_eq!(timeline.transitions.len(), 1);
    let transition = &timeline.transitions[0];
    assert_eq!(transition.from_key, c);
    assert_eq!(transition.to_key, a);
    assert_eq!(transition.modulation, ModulationType::RelativeMinor);
    assert_eq!(transition.modulation.label(), "Relative Minor");
    assert_eq!(transition.from_time, 5.0);
    assert_eq!(transition.to_time, 6.0);
    assert!(transition.strength > 0.85);

    let summary = &timeline.summary;
    assert_eq!(summary.primary_key, Some(c));
    assert_eq!(summary.total_duration, 7.0);
    assert_eq!(summary.classification, Some(StabilityClass::ModeratelyStable));
    assert_eq!(summary.transition_count, 1);
    Ok(())
}

#[test]
fn both_chord_root_rules_find_the_relative_minor() -> Result<()> {
    let c = Key::major(0);
    let a = Key::minor(9);
    for rule in [ChordRootRule::LowestPitchClass, ChordRootRule::LowestPitch] {
        let mut config = AnalyzerConfig::default();
        config.evidence.chord_root_rule = rule;
        let timeline = analyze(&Piece::new(c_then_a_minor(4))?, config)?;

        let keys: Vec<_> = timeline.points.iter().map(|p| p.key).collect();
        assert_eq!(keys, vec![c, c, c, c, a, a, a], "{:?}", rule);
        assert!(timeline.points.iter().all(|p| p.confidence >= 0.65));
        assert_eq!(timeline.transitions.len(), 1, "{:?}", rule);
        assert_eq!(timeline.transitions[0].modulation, ModulationType::RelativeMinor);
        assert_eq!(timeline.summary.primary_key, Some(c));
    }
    Ok(())
}

#[test]
fn correlator_alone_tells_the_same_story() -> Result<()> {
    let mut config = AnalyzerConfig::default();
    config.evidence.chord_root = false;
    config.evidence.melodic = false;

    let timeline = analyze(&Piece::new(c_then_a_minor(4))?, config)?;
    assert_eq!(timeline.points.len(), 7);
    assert!(timeline.points.iter().all(|p| p.evidence.len() == 1));
    assert!(timeline.points.iter().all(|p| p.combined_confidence == 1.0));
    assert_eq!(timeline.transitions.len(), 1);
    assert_eq!(timeline.transitions[0].to_key, Key::minor(9));
    Ok(())
}

#[test]
fn transposed_piece_moves_to_its_relative_minor() -> Result<()> {
    let mut notes = block(&[55, 59, 62], 0, 4); // G major
    notes.extend(block(&[52, 55, 59], 4, 8)); // E minor
    let timeline = analyze(&Piece::new(notes)?, AnalyzerConfig::default())?;

    assert_eq!(timeline.points.first().map(|p| p.key), Some(Key::major(7)));
    assert_eq!(timeline.points.last().map(|p| p.key), Some(Key::minor(4)));
    assert_eq!(timeline.transitions.len(), 1);
    assert_eq!(timeline.transitions[0].modulation.label(), "Relative Minor");
    Ok(())
}

#[test]
fn measure_windows_follow_the_tempo_map() -> Result<()> {
    let piece = Piece::with_timing(
        c_then_a_minor(16),
        vec![TempoChange { time: 0.0, bpm: 120.0 }],
        vec![TimeSignatureChange {
            time: 0.0,
            numerator: 4,
            denominator: 4,
        }],
    )?;
    let tracker = SlidingWindowTracker::new(AnalyzerConfig::default())?;
    let timeline = tracker.analyze(&piece);

    assert_eq!(timeline.mode, WindowingMode::Measures);
    assert_eq!(timeline.points.len(), 15);
    let c_points = timeline
        .points
        .iter()
        .take_while(|p| p.key == Key::major(0))
        .count();
    assert_eq!(c_points, 8);
    assert!(timeline.points[8..].iter().all(|p| p.key == Key::minor(9)));

    assert_eq!(timeline.points[0].measure, Some(2));
    assert_eq!((timeline.points[0].window_start, timeline.points[0].window_end), (0.0, 4.0));

    assert_eq!(timeline.transitions.len(), 1);
    assert_eq!(timeline.transitions[0].from_time, 18.0);
    assert_eq!(timeline.transitions[0].to_time, 20.0);

    assert_eq!(timeline.key_at_measure(3).map(|p| p.key), Some(Key::major(0)));
    assert_eq!(timeline.key_at_measure(12).map(|p| p.key), Some(Key::minor(9)));
    assert_eq!(timeline.key_at_time(25.0).map(|p| p.key), Some(Key::minor(9)));

    let range = tracker.analyze_measure_range(&piece, 9, 16);
    assert_eq!(range.map(|p| p.key), Some(Key::minor(9)));
    Ok(())
}

#[test]
fn explicit_measure_boundaries_enable_measure_mode() -> Result<()> {
    let piece = Piece::new(c_then_a_minor(4))?
        .with_measure_boundaries(vec![0.0, 2.0, 4.0, 6.0, 8.0])?;
    let timeline = analyze(&piece, AnalyzerConfig::default())?;
    assert_eq!(timeline.mode, WindowingMode::Measures);
    assert_eq!(
        timeline.measure_boundaries.as_deref(),
        Some(&[0.0, 2.0, 4.0, 6.0, 8.0][..])
    );
    // Windows [0,4) [2,6) [4,8)
    assert_eq!(timeline.points.len(), 3);
    assert_eq!(timeline.points[2].key, Key::minor(9));
    Ok(())
}

#[test]
fn empty_piece_has_no_primary_key() -> Result<()> {
    let timeline = analyze(&Piece::new(Vec::new())?, AnalyzerConfig::default())?;
    assert!(timeline.is_empty());
    assert!(timeline.transitions.is_empty());
    assert_eq!(timeline.primary_key(), None);
    assert_eq!(timeline.summary.label(), "No Primary Key");
    Ok(())
}

#[test]
fn atonal_piece_yields_empty_timeline() -> Result<()> {
    // Stacked diminished sevenths never reach the correlation threshold.
    let notes = block(&[48, 51, 54, 57], 0, 8);
    let timeline = analyze(&Piece::new(notes)?, AnalyzerConfig::default())?;
    assert!(timeline.is_empty());
    assert_eq!(timeline.summary.primary_key, None);
    assert_eq!(timeline.summary.classification, None);
    Ok(())
}

#[test]
fn silent_gap_contributes_no_points() -> Result<()> {
    let mut notes = block(C_MAJOR, 0, 4);
    notes.extend(block(C_MAJOR, 10, 14));
    let timeline = analyze(&Piece::new(notes)?, AnalyzerConfig::default())?;

    assert_eq!(timeline.points.len(), 8);
    assert!(timeline
        .points
        .iter()
        .all(|p| p.window_end <= 5.0 || p.window_start >= 9.0));
    assert!(timeline.transitions.is_empty());
    assert_eq!(timeline.summary.classification, Some(StabilityClass::VeryStable));
    Ok(())
}

#[test]
fn long_silence_belongs_to_no_key() -> Result<()> {
    let g_major = [55, 59, 62];
    let mut notes = block(C_MAJOR, 0, 4);
    notes.extend(block(&g_major, 40, 48));
    let timeline = analyze(&Piece::new(notes)?, AnalyzerConfig::default())?;

    let c = Key::major(0);
    let g = Key::major(7);
    assert_eq!(timeline.summary.primary_key, Some(g));
    // Four C windows own 4 s; eight G windows own 9 s up to the last window end.
    assert_eq!(timeline.summary.total_duration, 13.0);
    assert_eq!(timeline.summary.key_shares[1].key, c);
    assert_eq!(timeline.summary.key_shares[1].seconds, 4.0);
    assert!(timeline.summary.stability_score < 0.7);

    assert_eq!(timeline.key_at_time(2.5).map(|p| p.key), Some(c));
    assert!(timeline.key_at_time(20.0).is_none());
    assert_eq!(timeline.key_at_time(45.5).map(|p| p.key), Some(g));
    assert_eq!(timeline.transitions.len(), 1);
    assert_eq!(timeline.transitions[0].to_key, g);
    Ok(())
}

#[test]
fn measure_boundaries_must_cover_the_notes() -> Result<()> {
    let result = Piece::new(c_then_a_minor(4))?.with_measure_boundaries(vec![0.0, 2.0, 4.0]);
    assert!(matches!(result, Err(Error::InvalidMeasureGrid(_))));
    Ok(())
}

#[test]
fn malformed_notes_fail_at_ingestion() {
    let notes = vec![Note::new(60, 0.0, 1.0, 100), Note::new(64, 3.0, 2.0, 100)];
    match Piece::new(notes) {
        Err(Error::InvalidNote { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected InvalidNote, got {:?}", other),
    }
}

#[test]
fn invalid_config_is_reported() -> Result<()> {
    let config = AnalyzerConfig {
        overlap_ratio: 1.0,
        ..Default::default()
    };
    let result = analyze(&Piece::new(c_then_a_minor(4))?, config);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    Ok(())
}

#[test]
fn timeline_exports_json() -> Result<()> {
    let timeline = analyze(&Piece::new(c_then_a_minor(4))?, AnalyzerConfig::default())?;
    let json = timeline.to_json()?;
    let value: serde_json::Value = serde_json::from_str(&json)?;

    assert_eq!(value["mode"], "fixed_duration");
    assert_eq!(value["points"].as_array().map(Vec::len), Some(7));
    assert_eq!(value["points"][0]["key"]["mode"], "major");
    assert_eq!(value["transitions"][0]["modulation"]["type"], "relative_minor");
    assert_eq!(value["summary"]["classification"], "moderately_stable");
    assert!(value.get("measure_boundaries").is_none());
    Ok(())
}
