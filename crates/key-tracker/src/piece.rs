use crate::error::{Error, Result};
use crate::timing::{MeasureGrid, TempoChange, TimeSignatureChange, MAX_TEMPO_BPM};
use crate::types::Note;

/// Validated analysis input: notes plus whatever timing metadata the
/// MIDI-parsing collaborator could supply.
///
/// Construction is the only place input is checked. Once a `Piece` exists
/// every downstream stage can assume well-formed notes and sorted events.
#[derive(Debug, Clone, Default)]
pub struct Piece {
    notes: Vec<Note>,
    tempo_changes: Vec<TempoChange>,
    time_signatures: Vec<TimeSignatureChange>,
    measure_boundaries: Option<Vec<f64>>,
}

impl Piece {
    /// Notes only; analysis will use fixed-duration windows.
    pub fn new(notes: Vec<Note>) -> Result<Self> {
        Self::with_timing(notes, Vec::new(), Vec::new())
    }

    /// Notes with tempo and time-signature events (each `(time, value)` in seconds).
    pub fn with_timing(
        notes: Vec<Note>,
        mut tempo_changes: Vec<TempoChange>,
        mut time_signatures: Vec<TimeSignatureChange>,
    ) -> Result<Self> {
        for (index, note) in notes.iter().enumerate() {
            validate_note(index, note)?;
        }
        for (index, tempo) in tempo_changes.iter().enumerate() {
            validate_tempo(index, tempo)?;
        }
        for (index, sig) in time_signatures.iter().enumerate() {
            validate_time_signature(index, sig)?;
        }

        tempo_changes.sort_by(|a, b| a.time.total_cmp(&b.time));
        time_signatures.sort_by(|a, b| a.time.total_cmp(&b.time));

        Ok(Self {
            notes,
            tempo_changes,
            time_signatures,
            measure_boundaries: None,
        })
    }

    /// Supply measure boundary times directly, bypassing tempo-map derivation.
    ///
    /// Boundaries must be finite and strictly increasing, at least two of them,
    /// and span every note from the earliest start to the latest end.
    pub fn with_measure_boundaries(mut self, boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.iter().any(|b| !b.is_finite()) {
            return Err(Error::InvalidMeasureGrid(
                "boundaries must be finite".to_string(),
            ));
        }
        let Some(grid) = MeasureGrid::from_boundaries(boundaries) else {
            return Err(Error::InvalidMeasureGrid(
                "need at least two strictly increasing boundaries".to_string(),
            ));
        };
        if let Some((start, end)) = self.time_bounds() {
            let first = grid.boundaries()[0];
            if first > start || grid.end_time() < end {
                return Err(Error::InvalidMeasureGrid(format!(
                    "boundaries {}..{} do not cover notes {}..{}",
                    first,
                    grid.end_time(),
                    start,
                    end
                )));
            }
        }
        self.measure_boundaries = Some(grid.boundaries().to_vec());
        Ok(self)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn tempo_changes(&self) -> &[TempoChange] {
        &self.tempo_changes
    }

    pub fn time_signatures(&self) -> &[TimeSignatureChange] {
        &self.time_signatures
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Earliest note start and latest note end, `None` without notes.
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        let start = self.notes.iter().map(|n| n.start).min_by(|a, b| a.total_cmp(b))?;
        let end = self.notes.iter().map(|n| n.end).max_by(|a, b| a.total_cmp(b))?;
        Some((start, end))
    }

    /// Whether measure positions can be derived at all.
    pub fn has_timing_metadata(&self) -> bool {
        self.measure_boundaries.is_some()
            || !self.tempo_changes.is_empty()
            || !self.time_signatures.is_empty()
    }

    /// Measure grid covering the piece, or `None` when no timing metadata
    /// exists (or there is nothing to cover).
    pub fn measure_grid(
        &self,
        default_bpm: f64,
        default_signature: TimeSignatureChange,
    ) -> Option<MeasureGrid> {
        if let Some(boundaries) = &self.measure_boundaries {
            return MeasureGrid::from_boundaries(boundaries.clone());
        }
        if !self.has_timing_metadata() {
            return None;
        }
        let (_, end) = self.time_bounds()?;
        MeasureGrid::from_events(
            &self.tempo_changes,
            &self.time_signatures,
            end,
            default_bpm,
            default_signature,
        )
    }
}

fn validate_note(index: usize, note: &Note) -> Result<()> {
    let fail = |reason: String| Err(Error::InvalidNote { index, reason });

    if note.pitch > 127 {
        return fail(format!("pitch {} outside 0-127", note.pitch));
    }
    if note.velocity > 127 {
        return fail(format!("velocity {} outside 0-127", note.velocity));
    }
    if !note.start.is_finite() || note.start < 0.0 {
        return fail(format!("start {} must be finite and non-negative", note.start));
    }
    if !note.end.is_finite() {
        return fail(format!("end {} must be finite", note.end));
    }
    if note.end < note.start {
        return fail(format!("end {} precedes start {}", note.end, note.start));
    }
    Ok(())
}

fn validate_tempo(index: usize, tempo: &TempoChange) -> Result<()> {
    if !tempo.time.is_finite() || tempo.time < 0.0 {
        return Err(Error::InvalidTempo {
            index,
            reason: format!("time {} must be finite and non-negative", tempo.time),
        });
    }
    if !tempo.bpm.is_finite() || tempo.bpm <= 0.0 || tempo.bpm > MAX_TEMPO_BPM {
        return Err(Error::InvalidTempo {
            index,
            reason: format!("bpm {} must be in (0, {}]", tempo.bpm, MAX_TEMPO_BPM),
        });
    }
    Ok(())
}

pub(crate) fn validate_time_signature(index: usize, sig: &TimeSignatureChange) -> Result<()> {
    if !sig.time.is_finite() || sig.time < 0.0 {
        return Err(Error::InvalidTimeSignature {
            index,
            reason: format!("time {} must be finite and non-negative", sig.time),
        });
    }
    if sig.numerator == 0 {
        return Err(Error::InvalidTimeSignature {
            index,
            reason: "numerator must be at least 1".to_string(),
        });
    }
    if sig.denominator == 0 || !sig.denominator.is_power_of_two() {
        return Err(Error::InvalidTimeSignature {
            index,
            reason: format!("denominator {} must be a power of two", sig.denominator),
        });
    }
    Ok(())
}
