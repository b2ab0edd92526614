//! Per-window key evidence.
//!
//! Three independent sources look at the notes inside a window:
//!
//! - the pitch-class profile (duration × velocity weighted), scored by the
//!   correlator against the key templates
//! - chord roots sampled at a fixed interval, with mode from third quality
//! - melodic scale fit of the onsets falling inside the window
//!
//! Each produces at most one candidate; [`combine`] merges them into a
//! weighted vote.

use tracing::trace;

use crate::config::{ChordRootRule, EvidenceConfig};
use crate::profile::{KeyProfiles, PitchClassProfile};
use crate::types::{Evidence, EvidenceMethod, Key, KeyEstimate, Mode, Note};

/// Weighted pitch-class profile of everything sounding in `[start, end)`.
///
/// Each note contributes `overlap_seconds × velocity / 127` to its pitch
/// class. `None` when nothing contributes, which means "no estimate" and
/// must never be read as C major.
pub fn extract_profile(notes: &[Note], start: f64, end: f64) -> Option<PitchClassProfile> {
    let mut weights = [0.0_f64; 12];
    for note in notes {
        let overlap = note.overlap(start, end);
        if overlap <= 0.0 {
            continue;
        }
        weights[note.pitch_class() as usize] += overlap * (note.velocity as f64 / 127.0);
    }
    PitchClassProfile::from_weights(weights)
}

/// Correlator result for a profile, rejected below `threshold`.
pub fn pitch_class_evidence(
    profiles: &KeyProfiles,
    profile: &PitchClassProfile,
    threshold: f64,
) -> Option<KeyEstimate> {
    let best = profiles.best_key(profile.as_array());
    trace!(key = %best.key, correlation = best.confidence, "pitch-class evidence");
    (best.confidence >= threshold).then_some(best)
}

/// Most frequent chord root across regularly spaced samples of the window.
///
/// A sample only counts when at least two distinct pitch classes sound.
/// Mode comes from comparing major-third and minor-third occurrences above
/// the winning root over every sampled chord; ties read as minor.
/// Confidence is the winning root's share of the counted samples.
pub fn chord_root_evidence(
    notes: &[Note],
    start: f64,
    end: f64,
    config: &EvidenceConfig,
) -> Option<KeyEstimate> {
    let active: Vec<&Note> = notes.iter().filter(|n| n.overlap(start, end) > 0.0).collect();
    if active.is_empty() {
        return None;
    }

    let mut chords: Vec<Vec<u8>> = Vec::new();
    let mut root_counts = [0usize; 12];

    let mut sample = 0usize;
    loop {
        let time = start + sample as f64 * config.chord_sample_interval;
        if time >= end {
            break;
        }
        sample += 1;

        let mut pitch_classes: Vec<u8> = Vec::new();
        let mut lowest_pitch: Option<u8> = None;
        for note in active.iter().filter(|n| n.sounding_at(time)) {
            let pc = note.pitch_class();
            if !pitch_classes.contains(&pc) {
                pitch_classes.push(pc);
            }
            lowest_pitch = Some(lowest_pitch.map_or(note.pitch, |p| p.min(note.pitch)));
        }

        if pitch_classes.len() < 2 {
            continue;
        }
        pitch_classes.sort_unstable();

        let root = match config.chord_root_rule {
            ChordRootRule::LowestPitch => match lowest_pitch {
                Some(pitch) => pitch % 12,
                None => continue,
            },
            ChordRootRule::LowestPitchClass => pitch_classes[0],
        };
        root_counts[root as usize] += 1;
        chords.push(pitch_classes);
    }

    let total: usize = root_counts.iter().sum();
    if total == 0 {
        return None;
    }

    // Lowest pitch class wins a tie between equally frequent roots.
    let mut root = 0u8;
    for pc in 1..12u8 {
        if root_counts[pc as usize] > root_counts[root as usize] {
            root = pc;
        }
    }

    let mut major_thirds = 0usize;
    let mut minor_thirds = 0usize;
    for chord in &chords {
        for &pc in chord {
            match (pc + 12 - root) % 12 {
                4 => major_thirds += 1,
                3 => minor_thirds += 1,
                _ => {}
            }
        }
    }
    let mode = if major_thirds > minor_thirds {
        Mode::Major
    } else {
        Mode::Minor
    };

    let estimate = KeyEstimate {
        key: Key::new(root, mode),
        confidence: root_counts[root as usize] as f64 / total as f64,
    };
    trace!(
        key = %estimate.key,
        share = estimate.confidence,
        samples = total,
        "chord-root evidence"
    );
    Some(estimate)
}

/// Best diatonic scale fit of the pitch classes whose onsets fall in
/// `[start, end)`. Accepted only when the winning fraction exceeds
/// `config.melodic_threshold`; ties go to the first key in stable order.
pub fn melodic_evidence(
    notes: &[Note],
    start: f64,
    end: f64,
    config: &EvidenceConfig,
) -> Option<KeyEstimate> {
    let pitch_classes: Vec<u8> = notes
        .iter()
        .filter(|n| start <= n.start && n.start < end)
        .map(|n| n.pitch_class())
        .collect();

    if pitch_classes.is_empty() || pitch_classes.len() < config.melodic_min_notes {
        return None;
    }

    let mut best: Option<KeyEstimate> = None;
    for key in Key::all() {
        let fit = scale_fit(&pitch_classes, key);
        if best.map_or(true, |b| fit > b.confidence) {
            best = Some(KeyEstimate {
                key,
                confidence: fit,
            });
        }
    }

    let best = best?;
    trace!(key = %best.key, fit = best.confidence, "melodic evidence");
    (best.confidence > config.melodic_threshold).then_some(best)
}

/// Fraction of `pitch_classes` inside `key`'s diatonic scale.
pub fn scale_fit(pitch_classes: &[u8], key: Key) -> f64 {
    if pitch_classes.is_empty() {
        return 0.0;
    }
    let inside = pitch_classes.iter().filter(|&&pc| key.contains(pc)).count();
    inside as f64 / pitch_classes.len() as f64
}

/// Attach a method and its reliability to an estimate.
pub fn weigh(method: EvidenceMethod, estimate: KeyEstimate, reliability: f64) -> Evidence {
    Evidence {
        method,
        key: estimate.key,
        confidence: estimate.confidence,
        weight: estimate.confidence * reliability,
    }
}

/// Weighted vote over evidence sources.
///
/// Returns the key with the largest summed weight and its share of the total
/// weight. Ties go to the key whose evidence appeared first. `None` when the
/// total weight is not positive.
pub fn combine(evidence: &[Evidence]) -> Option<(Key, f64)> {
    let mut votes: Vec<(Key, f64)> = Vec::new();
    let mut total = 0.0;

    for item in evidence {
        if !(item.weight > 0.0) {
            continue;
        }
        match votes.iter_mut().find(|(key, _)| *key == item.key) {
            Some(vote) => vote.1 += item.weight,
            None => votes.push((item.key, item.weight)),
        }
        total += item.weight;
    }

    if !(total > 0.0) {
        return None;
    }

    let mut best = votes[0];
    for &vote in &votes[1..] {
        if vote.1 > best.1 {
            best = vote;
        }
    }
    Some((best.0, best.1 / total))
}

/// Share of the positive vote weight cast for `key`; 0 when nothing votes.
pub fn vote_share(evidence: &[Evidence], key: Key) -> f64 {
    let mut total = 0.0;
    let mut for_key = 0.0;
    for item in evidence.iter().filter(|e| e.weight > 0.0) {
        total += item.weight;
        if item.key == key {
            for_key += item.weight;
        }
    }
    if total > 0.0 {
        for_key / total
    } else {
        0.0
    }
}
