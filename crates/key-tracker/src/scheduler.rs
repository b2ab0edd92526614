//! Window scheduling.
//!
//! Measure mode slides a window over the piece's measure grid; without timing
//! metadata the scheduler falls back to fixed-duration windows in seconds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AnalyzerConfig, FallbackWindowConfig};
use crate::piece::Piece;
use crate::timing::{MeasureGrid, TimeSignatureChange};

/// Smallest advance between window starts in measure mode.
const MIN_STEP_MEASURES: f64 = 1.0 / 64.0;
/// Smallest advance between window starts in fixed-duration mode.
const MIN_STEP_SECONDS: f64 = 1e-3;

/// Length of an analysis window in the unit its schedule counts in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum WindowSize {
    Measures(f64),
    Seconds(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowingMode {
    /// Windows follow the measure grid
    Measures,
    /// No measure information: fixed windows in seconds
    FixedDuration,
}

/// One analysis window. Ephemeral: built by the scheduler, read by the
/// analyzer, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWindow {
    pub start_time: f64,
    pub end_time: f64,
    pub center_time: f64,
    pub size: WindowSize,
    /// 1-based measure containing `center_time` (measure mode only)
    pub center_measure: Option<u32>,
}

impl AnalysisWindow {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Windows for a whole piece, plus the grid they were cut from.
#[derive(Debug, Clone)]
pub struct WindowSchedule {
    pub mode: WindowingMode,
    pub windows: Vec<AnalysisWindow>,
    pub grid: Option<MeasureGrid>,
}

#[derive(Debug, Clone)]
pub struct WindowScheduler {
    base_window_measures: f64,
    overlap_ratio: f64,
    adaptive_window: bool,
    min_window_measures: f64,
    max_window_measures: f64,
    default_tempo_bpm: f64,
    default_signature: TimeSignatureChange,
    fallback: FallbackWindowConfig,
}

impl WindowScheduler {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            base_window_measures: config.base_window_measures,
            overlap_ratio: config.overlap_ratio,
            adaptive_window: config.adaptive_window,
            min_window_measures: config.min_window_measures,
            max_window_measures: config.max_window_measures,
            default_tempo_bpm: config.default_tempo_bpm,
            default_signature: config.default_time_signature.as_change(),
            fallback: config.fallback,
        }
    }

    /// Cut the piece into windows, measure mode when a grid can be derived.
    pub fn schedule(&self, piece: &Piece) -> WindowSchedule {
        if let Some(grid) = piece.measure_grid(self.default_tempo_bpm, self.default_signature) {
            let windows = self.measure_windows(&grid);
            debug!(
                measures = grid.measure_count(),
                windows = windows.len(),
                "scheduled measure windows"
            );
            return WindowSchedule {
                mode: WindowingMode::Measures,
                windows,
                grid: Some(grid),
            };
        }

        let windows = match piece.time_bounds() {
            Some((start, end)) => self.fixed_windows(start, end),
            None => Vec::new(),
        };
        debug!(
            windows = windows.len(),
            window_seconds = self.fallback.window_seconds,
            "no measure information, scheduled fixed-duration windows"
        );
        WindowSchedule {
            mode: WindowingMode::FixedDuration,
            windows,
            grid: None,
        }
    }

    /// Window length in measures.
    ///
    /// Adaptive sizing keeps the base size inside the configured bounds;
    /// density-driven stretching is not performed.
    pub fn window_measures(&self) -> f64 {
        if !self.adaptive_window {
            return self.base_window_measures;
        }
        let size = self
            .base_window_measures
            .clamp(self.min_window_measures, self.max_window_measures);
        if size != self.base_window_measures {
            debug!(
                base = self.base_window_measures,
                size, "adaptive window clamped to bounds"
            );
        }
        size
    }

    /// Overlapping windows over every measure of `grid`. The final window is
    /// truncated at the end of the grid.
    pub fn measure_windows(&self, grid: &MeasureGrid) -> Vec<AnalysisWindow> {
        let total = grid.measure_count() as f64;
        let size = self.window_measures();
        let step = (size * (1.0 - self.overlap_ratio)).max(MIN_STEP_MEASURES);

        let mut windows = Vec::new();
        let mut index = 0usize;
        loop {
            let position = index as f64 * step;
            if position >= total {
                break;
            }
            let end_position = (position + size).min(total);
            windows.push(measure_window(grid, position, end_position));
            if position + size >= total {
                break;
            }
            index += 1;
        }
        windows
    }

    /// Fixed-duration windows from `start` until a window reaches `end`.
    /// The last window may run past `end`.
    pub fn fixed_windows(&self, start: f64, end: f64) -> Vec<AnalysisWindow> {
        let length = self.fallback.window_seconds;
        let step = self.fallback.step_seconds.max(MIN_STEP_SECONDS);

        let mut windows = Vec::new();
        let mut index = 0usize;
        loop {
            let window_start = start + index as f64 * step;
            let window_end = window_start + length;
            windows.push(AnalysisWindow {
                start_time: window_start,
                end_time: window_end,
                center_time: (window_start + window_end) / 2.0,
                size: WindowSize::Seconds(length),
                center_measure: None,
            });
            if window_end >= end {
                break;
            }
            index += 1;
        }
        windows
    }

    /// Measure grid used for measure-addressed queries. Pieces without
    /// timing metadata get a grid at the default tempo and meter.
    pub fn query_grid(&self, piece: &Piece) -> Option<MeasureGrid> {
        piece
            .measure_grid(self.default_tempo_bpm, self.default_signature)
            .or_else(|| {
                let (_, end) = piece.time_bounds()?;
                MeasureGrid::from_events(
                    &[],
                    &[],
                    end,
                    self.default_tempo_bpm,
                    self.default_signature,
                )
            })
    }

    /// A single window spanning the 1-based inclusive measures `first..=last`.
    pub fn measure_range_window(
        &self,
        grid: &MeasureGrid,
        first: u32,
        last: u32,
    ) -> Option<AnalysisWindow> {
        let (start_time, end_time) = grid.span(first, last)?;
        let measures = (last.min(grid.measure_count() as u32) - first + 1) as f64;
        let center_time = (start_time + end_time) / 2.0;
        Some(AnalysisWindow {
            start_time,
            end_time,
            center_time,
            size: WindowSize::Measures(measures),
            center_measure: grid.measure_at(center_time).map(|m| m as u32 + 1),
        })
    }
}

fn measure_window(grid: &MeasureGrid, position: f64, end_position: f64) -> AnalysisWindow {
    let start_time = grid.time_at(position);
    let end_time = grid.time_at(end_position);
    let center_time = (start_time + end_time) / 2.0;
    AnalysisWindow {
        start_time,
        end_time,
        center_time,
        size: WindowSize::Measures(end_position - position),
        center_measure: grid.measure_at(center_time).map(|m| m as u32 + 1),
    }
}
