use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{AnalyzerConfig, EvidenceConfig};
use crate::error::Result;
use crate::evidence::{
    chord_root_evidence, combine, extract_profile, melodic_evidence, pitch_class_evidence,
    vote_share, weigh,
};
use crate::piece::Piece;
use crate::profile::KeyProfiles;
use crate::scheduler::{AnalysisWindow, WindowScheduler};
use crate::stability::{smooth_outliers, StabilityTracker};
use crate::summary::summarize;
use crate::timeline::KeyTimeline;
use crate::types::{Evidence, EvidenceMethod, Key, KeyAnalysisPoint, Note};

/// Per-window verdict from an analysis backend.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAnalysis {
    pub key: Key,
    /// Pearson correlation of the window profile with `key`
    pub correlation: f64,
    /// Winning share of the weighted vote
    pub combined_confidence: f64,
    pub evidence: Vec<Evidence>,
}

/// Trait for per-window key estimation backends.
///
/// Returning `None` means the window has no confident key; the tracker
/// skips it.
pub trait KeyAnalyzer: Send + Sync {
    fn analyze_window(&self, notes: &[Note], window: &AnalysisWindow) -> Option<WindowAnalysis>;
}

/// Krumhansl-Schmuckler correlation gated by a threshold, optionally
/// outvoted by chord-root and melodic evidence.
#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    profiles: KeyProfiles,
    threshold: f64,
    evidence: EvidenceConfig,
}

impl HeuristicAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            profiles: config.profiles.clone(),
            threshold: config.confidence_threshold,
            evidence: config.evidence.clone(),
        }
    }
}

impl KeyAnalyzer for HeuristicAnalyzer {
    fn analyze_window(&self, notes: &[Note], window: &AnalysisWindow) -> Option<WindowAnalysis> {
        let (start, end) = (window.start_time, window.end_time);

        let Some(profile) = extract_profile(notes, start, end) else {
            debug!(start, end, "no evidence in window");
            return None;
        };
        let Some(primary) = pitch_class_evidence(&self.profiles, &profile, self.threshold) else {
            debug!(start, end, "no confident key in window");
            return None;
        };

        let reliability = &self.evidence.reliability;
        let mut evidence = vec![weigh(
            EvidenceMethod::PitchClass,
            primary,
            reliability.pitch_class,
        )];
        if self.evidence.chord_root {
            if let Some(estimate) = chord_root_evidence(notes, start, end, &self.evidence) {
                evidence.push(weigh(
                    EvidenceMethod::ChordRoot,
                    estimate,
                    reliability.chord_root,
                ));
            }
        }
        if self.evidence.melodic {
            if let Some(estimate) = melodic_evidence(notes, start, end, &self.evidence) {
                evidence.push(weigh(EvidenceMethod::Melodic, estimate, reliability.melodic));
            }
        }

        // With every reliability at zero nothing votes; keep the correlator's key.
        let (voted, share) = combine(&evidence).unwrap_or((primary.key, 0.0));
        let correlation = self.profiles.correlate(profile.as_array(), voted);
        if correlation >= self.threshold {
            return Some(WindowAnalysis {
                key: voted,
                correlation,
                combined_confidence: share,
                evidence,
            });
        }

        // The vote may not pick a key the profile itself rejects.
        debug!(
            start,
            end,
            voted = %voted,
            correlation,
            kept = %primary.key,
            "vote winner below threshold, keeping correlator key"
        );
        Some(WindowAnalysis {
            key: primary.key,
            correlation: primary.confidence,
            combined_confidence: vote_share(&evidence, primary.key),
            evidence,
        })
    }
}

/// Sliding-window key tracker: schedules windows, asks the backend for each
/// one, then runs stability tracking, smoothing and summary.
pub struct SlidingWindowTracker {
    config: AnalyzerConfig,
    scheduler: WindowScheduler,
    analyzer: Arc<dyn KeyAnalyzer>,
}

impl SlidingWindowTracker {
    /// Tracker with the default heuristic backend.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let analyzer = Arc::new(HeuristicAnalyzer::new(&config));
        Self::with_analyzer(config, analyzer)
    }

    /// Tracker with a custom per-window backend.
    pub fn with_analyzer(config: AnalyzerConfig, analyzer: Arc<dyn KeyAnalyzer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler: WindowScheduler::new(&config),
            config,
            analyzer,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, piece: &Piece) -> KeyTimeline {
        info!(notes = piece.notes().len(), "starting key analysis");

        let schedule = self.scheduler.schedule(piece);
        let mut tracker = StabilityTracker::new(self.config.stability_threshold);
        let mut points = Vec::new();

        for window in &schedule.windows {
            if let Some(point) = self.analyze_window(piece, window) {
                tracker.update(&point);
                points.push(point);
            }
        }

        let smoothed = smooth_outliers(
            &mut points,
            self.config.confidence_threshold,
            self.config.smoothing_margin,
        );
        let transitions = tracker.into_transitions();
        let summary = summarize(&points, &transitions);

        info!(
            mode = ?schedule.mode,
            windows = schedule.windows.len(),
            points = points.len(),
            smoothed,
            transitions = transitions.len(),
            primary_key = ?summary.primary_key,
            "key analysis complete"
        );

        KeyTimeline {
            mode: schedule.mode,
            points,
            transitions,
            summary,
            measure_boundaries: schedule.grid.map(|grid| grid.boundaries().to_vec()),
        }
    }

    /// Key of a single window spanning the 1-based inclusive measures
    /// `first..=last`. Pieces without timing metadata are measured at the
    /// default tempo and meter.
    pub fn analyze_measure_range(
        &self,
        piece: &Piece,
        first: u32,
        last: u32,
    ) -> Option<KeyAnalysisPoint> {
        let grid = self.scheduler.query_grid(piece)?;
        let window = self.scheduler.measure_range_window(&grid, first, last)?;
        self.analyze_window(piece, &window)
    }

    fn analyze_window(&self, piece: &Piece, window: &AnalysisWindow) -> Option<KeyAnalysisPoint> {
        let analysis = self.analyzer.analyze_window(piece.notes(), window)?;
        Some(KeyAnalysisPoint {
            time: window.center_time,
            measure: window.center_measure,
            window_start: window.start_time,
            window_end: window.end_time,
            window_size: window.size,
            key: analysis.key,
            confidence: analysis.correlation,
            combined_confidence: analysis.combined_confidence,
            evidence: analysis.evidence,
            smoothed: false,
        })
    }
}
