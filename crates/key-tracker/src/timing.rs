use serde::{Deserialize, Serialize};

/// Fastest tempo accepted from input or config, in quarter notes per minute.
pub const MAX_TEMPO_BPM: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    /// Seconds
    pub time: f64,
    /// Quarter notes per minute
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureChange {
    /// Seconds
    pub time: f64,
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignatureChange {
    /// Length of one measure in seconds at `bpm` quarter notes per minute.
    pub fn measure_duration(&self, bpm: f64) -> f64 {
        let quarters = self.numerator as f64 * 4.0 / self.denominator as f64;
        quarters * 60.0 / bpm
    }
}

/// Measure boundary times for a piece.
///
/// `boundaries[i]` is the start of measure `i` (0-based) and the final entry
/// closes the last measure, so a grid of `n` measures holds `n + 1` times.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureGrid {
    boundaries: Vec<f64>,
}

impl MeasureGrid {
    /// Walk measure by measure from time zero until `end_time` is covered.
    ///
    /// Tempo and signature events take effect at the first measure boundary
    /// at or after their timestamp. Both event lists must be sorted by time.
    pub fn from_events(
        tempo_changes: &[TempoChange],
        time_signatures: &[TimeSignatureChange],
        end_time: f64,
        default_bpm: f64,
        default_signature: TimeSignatureChange,
    ) -> Option<Self> {
        if !(end_time > 0.0) || !end_time.is_finite() {
            return None;
        }

        let mut boundaries = vec![0.0];
        let mut current = 0.0;
        let mut bpm = default_bpm;
        let mut signature = default_signature;
        let mut tempo_idx = 0;
        let mut sig_idx = 0;

        while current < end_time {
            while tempo_idx < tempo_changes.len() && tempo_changes[tempo_idx].time <= current {
                bpm = tempo_changes[tempo_idx].bpm;
                tempo_idx += 1;
            }
            while sig_idx < time_signatures.len() && time_signatures[sig_idx].time <= current {
                signature = time_signatures[sig_idx];
                sig_idx += 1;
            }

            let duration = signature.measure_duration(bpm);
            if !(duration > 0.0) || !duration.is_finite() {
                return None;
            }
            current += duration;
            boundaries.push(current);
        }

        Some(Self { boundaries })
    }

    /// Build a grid directly from boundary times. Needs at least two strictly
    /// increasing times.
    pub fn from_boundaries(boundaries: Vec<f64>) -> Option<Self> {
        if boundaries.len() < 2 || boundaries.windows(2).any(|w| !(w[1] > w[0])) {
            return None;
        }
        Some(Self { boundaries })
    }

    pub fn measure_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn end_time(&self) -> f64 {
        self.boundaries[self.boundaries.len() - 1]
    }

    /// Time at a fractional 0-based measure position, interpolating inside
    /// the measure. Positions are clamped to the grid.
    pub fn time_at(&self, position: f64) -> f64 {
        let count = self.measure_count();
        if position <= 0.0 {
            return self.boundaries[0];
        }
        if position >= count as f64 {
            return self.end_time();
        }
        let index = position.floor() as usize;
        let frac = position - index as f64;
        let start = self.boundaries[index];
        let end = self.boundaries[index + 1];
        start + frac * (end - start)
    }

    /// 0-based index of the measure containing `time`.
    pub fn measure_at(&self, time: f64) -> Option<usize> {
        if time < self.boundaries[0] || time >= self.end_time() {
            return None;
        }
        // partition_point yields the first boundary strictly after `time`
        let idx = self.boundaries.partition_point(|&b| b <= time);
        Some(idx - 1)
    }

    /// Time span of the 1-based inclusive measure range `first..=last`.
    ///
    /// A range running past the grid ends at the grid's end.
    pub fn span(&self, first: u32, last: u32) -> Option<(f64, f64)> {
        if first == 0 || last < first {
            return None;
        }
        let start_idx = (first - 1) as usize;
        if start_idx >= self.measure_count() {
            return None;
        }
        let end_idx = (last as usize).min(self.measure_count());
        Some((self.boundaries[start_idx], self.boundaries[end_idx]))
    }
}
