use serde::{Deserialize, Serialize};

use crate::types::{Key, KeyEstimate, Mode};

/// Krumhansl-Kessler major key profile (duration-weighted perception studies).
pub const KRUMHANSL_MAJOR: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor key profile.
pub const KRUMHANSL_MINOR: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// A normalized 12-bin pitch-class weight distribution (index 0 = C).
///
/// Only constructible from a non-zero total weight; silence has no profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchClassProfile([f64; 12]);

impl PitchClassProfile {
    /// Normalize raw weights to sum to 1. `None` when the total is not positive.
    pub fn from_weights(weights: [f64; 12]) -> Option<Self> {
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            return None;
        }
        let mut normalized = weights;
        for w in &mut normalized {
            *w /= total;
        }
        Some(Self(normalized))
    }

    pub fn as_array(&self) -> &[f64; 12] {
        &self.0
    }

    pub fn weight(&self, pitch_class: u8) -> f64 {
        self.0[(pitch_class % 12) as usize]
    }
}

/// Reference templates for the correlator, injected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyProfiles {
    pub major: [f64; 12],
    pub minor: [f64; 12],
}

impl Default for KeyProfiles {
    fn default() -> Self {
        Self::krumhansl_kessler()
    }
}

impl KeyProfiles {
    pub fn krumhansl_kessler() -> Self {
        Self {
            major: KRUMHANSL_MAJOR,
            minor: KRUMHANSL_MINOR,
        }
    }

    pub fn template(&self, mode: Mode) -> &[f64; 12] {
        match mode {
            Mode::Major => &self.major,
            Mode::Minor => &self.minor,
        }
    }

    /// Template for `key`, rotated so its tonic weight sits at `key.root`.
    pub fn rotated(&self, key: Key) -> [f64; 12] {
        rotate(self.template(key.mode), key.root as usize)
    }

    /// Pearson correlation between `profile` and the rotated template for `key`.
    ///
    /// Always in [-1, 1]; 0 when either side has zero variance.
    pub fn correlate(&self, profile: &[f64; 12], key: Key) -> f64 {
        pearson(profile, &self.rotated(key))
    }

    /// Correlation against all 24 keys, in stable order.
    pub fn scores(&self, profile: &[f64; 12]) -> Vec<KeyEstimate> {
        Key::all()
            .map(|key| KeyEstimate {
                key,
                confidence: self.correlate(profile, key),
            })
            .collect()
    }

    /// Best-matching key. Ties go to the first key in stable order
    /// (root ascending, major before minor), so the search is total.
    pub fn best_key(&self, profile: &[f64; 12]) -> KeyEstimate {
        let mut best = KeyEstimate {
            key: Key::major(0),
            confidence: f64::NEG_INFINITY,
        };
        for key in Key::all() {
            let corr = self.correlate(profile, key);
            if corr > best.confidence {
                best = KeyEstimate {
                    key,
                    confidence: corr,
                };
            }
        }
        best
    }
}

/// Cyclically shift a 12-vector up by `k` positions: `out[(i + k) % 12] = v[i]`.
pub fn rotate(values: &[f64; 12], k: usize) -> [f64; 12] {
    let mut out = [0.0; 12];
    for (i, &v) in values.iter().enumerate() {
        out[(i + k) % 12] = v;
    }
    out
}

/// Pearson correlation coefficient between two 12-element arrays.
///
/// Returns 0 when either array has no variance. A denominator below 1e-12
/// counts as zero, so a flat profile whose mean rounds unevenly still
/// correlates to exactly 0.
pub fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    (num / denom).clamp(-1.0, 1.0)
}
