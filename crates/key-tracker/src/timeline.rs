use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scheduler::WindowingMode;
use crate::summary::StabilitySummary;
use crate::timing::MeasureGrid;
use crate::types::{Key, KeyAnalysisPoint, TonalityTransition};

/// Result of analysing one piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyTimeline {
    pub mode: WindowingMode,
    /// Confident windows in chronological order, after smoothing
    pub points: Vec<KeyAnalysisPoint>,
    /// Stable-key changes in chronological order
    pub transitions: Vec<TonalityTransition>,
    pub summary: StabilitySummary,
    /// Measure boundaries used for scheduling (measure mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure_boundaries: Option<Vec<f64>>,
}

impl KeyTimeline {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn primary_key(&self) -> Option<Key> {
        self.summary.primary_key
    }

    /// Point whose span covers `time`.
    ///
    /// Point `i` covers `[time_i, min(time_{i+1}, window_end_i))`, matching
    /// the summary's time weighting. Silence between windows has no key.
    pub fn key_at_time(&self, time: f64) -> Option<&KeyAnalysisPoint> {
        let idx = self.points.partition_point(|p| p.time <= time);
        if idx == 0 {
            return None;
        }
        let point = &self.points[idx - 1];
        (time < point.window_end).then_some(point)
    }

    /// Point covering the middle of 1-based `measure`. `None` outside
    /// measure mode or past the grid.
    pub fn key_at_measure(&self, measure: u32) -> Option<&KeyAnalysisPoint> {
        let grid = MeasureGrid::from_boundaries(self.measure_boundaries.clone()?)?;
        let (start, end) = grid.span(measure, measure)?;
        self.key_at_time((start + end) / 2.0)
    }

    /// Pretty-printed JSON for visualization collaborators.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
