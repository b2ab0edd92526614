//! Analyzer parameters.
//!
//! Every tuning constant of the pipeline lives here, including the key
//! templates, so callers can load them from TOML (see [`crate::loader`]) or
//! construct them in code. All sections default individually, so a config
//! file only needs the values it changes:
//!
//! ```toml
//! base_window_measures = 4.0
//! confidence_threshold = 0.6
//!
//! [evidence]
//! melodic = false
//!
//! [evidence.reliability]
//! chord_root = 0.8
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::piece::validate_time_signature;
use crate::profile::KeyProfiles;
use crate::timing::{TimeSignatureChange, MAX_TEMPO_BPM};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Window length in measures (default: 2.0)
    pub base_window_measures: f64,
    /// Fraction of each window shared with the next, in [0, 1) (default: 0.5)
    pub overlap_ratio: f64,
    /// Minimum Pearson correlation for a window to count (default: 0.65)
    pub confidence_threshold: f64,
    /// Trailing buffer length for stable-key decisions (default: 3)
    pub stability_threshold: usize,
    /// Allow density-based window sizing (default: true)
    pub adaptive_window: bool,
    pub min_window_measures: f64,
    pub max_window_measures: f64,
    /// Points below `threshold + margin` may be smoothed away (default: 0.1)
    pub smoothing_margin: f64,
    /// Tempo assumed before the first tempo event (default: 120.0)
    pub default_tempo_bpm: f64,
    /// Meter assumed before the first time-signature event (default: 4/4)
    pub default_time_signature: MeterConfig,
    pub fallback: FallbackWindowConfig,
    pub evidence: EvidenceConfig,
    pub profiles: KeyProfiles,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_window_measures: 2.0,
            overlap_ratio: 0.5,
            confidence_threshold: 0.65,
            stability_threshold: 3,
            adaptive_window: true,
            min_window_measures: 0.5,
            max_window_measures: 8.0,
            smoothing_margin: 0.1,
            default_tempo_bpm: 120.0,
            default_time_signature: MeterConfig::default(),
            fallback: FallbackWindowConfig::default(),
            evidence: EvidenceConfig::default(),
            profiles: KeyProfiles::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Distance between consecutive window starts, in measures.
    pub fn step_measures(&self) -> f64 {
        self.base_window_measures * (1.0 - self.overlap_ratio)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if !positive(self.base_window_measures) {
            return invalid(format!(
                "base_window_measures must be positive, got {}",
                self.base_window_measures
            ));
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            return invalid(format!(
                "overlap_ratio must be in [0, 1), got {}",
                self.overlap_ratio
            ));
        }
        if !self.confidence_threshold.is_finite() {
            return invalid("confidence_threshold must be finite".to_string());
        }
        if self.stability_threshold == 0 {
            return invalid("stability_threshold must be at least 1".to_string());
        }
        if !positive(self.min_window_measures) || !positive(self.max_window_measures) {
            return invalid("window measure bounds must be positive".to_string());
        }
        if self.min_window_measures > self.max_window_measures {
            return invalid(format!(
                "min_window_measures {} exceeds max_window_measures {}",
                self.min_window_measures, self.max_window_measures
            ));
        }
        if !self.smoothing_margin.is_finite() || self.smoothing_margin < 0.0 {
            return invalid("smoothing_margin must be non-negative".to_string());
        }
        if !positive(self.default_tempo_bpm) || self.default_tempo_bpm > MAX_TEMPO_BPM {
            return invalid(format!(
                "default_tempo_bpm must be in (0, {}]",
                MAX_TEMPO_BPM
            ));
        }
        validate_time_signature(0, &self.default_time_signature.as_change())
            .map_err(|e| Error::InvalidConfig(format!("default_time_signature: {}", e)))?;
        if !positive(self.fallback.window_seconds) || !positive(self.fallback.step_seconds) {
            return invalid("fallback window and step must be positive".to_string());
        }
        self.evidence.validate()
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl MeterConfig {
    pub fn as_change(&self) -> TimeSignatureChange {
        TimeSignatureChange {
            time: 0.0,
            numerator: self.numerator,
            denominator: self.denominator,
        }
    }
}

/// Fixed-duration windowing used when no measure grid can be derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackWindowConfig {
    pub window_seconds: f64,
    pub step_seconds: f64,
}

impl Default for FallbackWindowConfig {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            step_seconds: 1.0,
        }
    }
}

/// How a chord's root candidate is picked from its sounding notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordRootRule {
    /// Pitch class of the lowest sounding note (the bass)
    LowestPitch,
    /// Smallest pitch-class number present, ignoring octave (default)
    LowestPitchClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Enable chord-root evidence
    pub chord_root: bool,
    /// Enable melodic scale-fit evidence
    pub melodic: bool,
    /// Seconds between chord samples inside a window (default: 0.25)
    pub chord_sample_interval: f64,
    pub chord_root_rule: ChordRootRule,
    /// Fewest onsets a window needs for melodic evidence (default: 4)
    pub melodic_min_notes: usize,
    /// Best scale-fit fraction must exceed this (default: 0.3)
    pub melodic_threshold: f64,
    pub reliability: ReliabilityWeights,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            chord_root: true,
            melodic: true,
            chord_sample_interval: 0.25,
            chord_root_rule: ChordRootRule::LowestPitchClass,
            melodic_min_notes: 4,
            melodic_threshold: 0.3,
            reliability: ReliabilityWeights::default(),
        }
    }
}

impl EvidenceConfig {
    fn validate(&self) -> Result<()> {
        if !positive(self.chord_sample_interval) {
            return Err(Error::InvalidConfig(
                "evidence.chord_sample_interval must be positive".to_string(),
            ));
        }
        if !self.melodic_threshold.is_finite() {
            return Err(Error::InvalidConfig(
                "evidence.melodic_threshold must be finite".to_string(),
            ));
        }
        let r = &self.reliability;
        if [r.pitch_class, r.chord_root, r.melodic]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(Error::InvalidConfig(
                "evidence.reliability weights must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-method multipliers applied to each source's confidence before voting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityWeights {
    pub pitch_class: f64,
    pub chord_root: f64,
    pub melodic: f64,
}

impl Default for ReliabilityWeights {
    fn default() -> Self {
        Self {
            pitch_class: 1.0,
            chord_root: 0.9,
            melodic: 0.7,
        }
    }
}
