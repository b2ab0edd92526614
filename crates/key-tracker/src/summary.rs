use serde::{Deserialize, Serialize};

use crate::types::{Key, KeyAnalysisPoint, TonalityTransition};

/// Qualitative reading of a stability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityClass {
    VeryStable,
    Stable,
    ModeratelyStable,
    Unstable,
    HighlyUnstable,
}

impl StabilityClass {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            StabilityClass::VeryStable
        } else if score >= 0.7 {
            StabilityClass::Stable
        } else if score >= 0.5 {
            StabilityClass::ModeratelyStable
        } else if score >= 0.3 {
            StabilityClass::Unstable
        } else {
            StabilityClass::HighlyUnstable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StabilityClass::VeryStable => "Very Stable",
            StabilityClass::Stable => "Stable",
            StabilityClass::ModeratelyStable => "Moderately Stable",
            StabilityClass::Unstable => "Unstable",
            StabilityClass::HighlyUnstable => "Highly Unstable",
        }
    }
}

/// Time attributed to one key across the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyShare {
    pub key: Key,
    pub seconds: f64,
    /// `seconds / total_duration`
    pub fraction: f64,
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilitySummary {
    /// Key holding the most time; `None` when no window was confident
    pub primary_key: Option<Key>,
    /// Fraction of analysed time spent in the primary key; silence between
    /// windows is not analysed time
    pub stability_score: f64,
    pub classification: Option<StabilityClass>,
    /// Largest share first
    pub key_shares: Vec<KeyShare>,
    pub total_duration: f64,
    pub point_count: usize,
    pub transition_count: usize,
    pub average_confidence: f64,
}

impl StabilitySummary {
    pub fn label(&self) -> &'static str {
        self.classification
            .as_ref()
            .map_or("No Primary Key", StabilityClass::label)
    }
}

/// Summarize a finished timeline.
///
/// Point `i` owns `[time_i, time_{i+1})`, cut short at its window end so
/// silence between windows belongs to no key. The last point owns the rest
/// of its window. Primary-key ties go to the key that appeared first.
pub fn summarize(
    points: &[KeyAnalysisPoint],
    transitions: &[TonalityTransition],
) -> StabilitySummary {
    let mut shares: Vec<KeyShare> = Vec::new();
    let mut total_duration = 0.0;

    for (i, point) in points.iter().enumerate() {
        let until = match points.get(i + 1) {
            Some(next) => next.time.min(point.window_end),
            None => point.window_end,
        };
        let seconds = (until - point.time).max(0.0);
        total_duration += seconds;

        match shares.iter_mut().find(|s| s.key == point.key) {
            Some(share) => {
                share.seconds += seconds;
                share.points += 1;
            }
            None => shares.push(KeyShare {
                key: point.key,
                seconds,
                fraction: 0.0,
                points: 1,
            }),
        }
    }

    let point_count = points.len();
    for share in &mut shares {
        share.fraction = if total_duration > 0.0 {
            share.seconds / total_duration
        } else {
            share.points as f64 / point_count as f64
        };
    }

    let mut primary: Option<&KeyShare> = None;
    for share in &shares {
        if primary.map_or(true, |p| share.fraction > p.fraction) {
            primary = Some(share);
        }
    }
    let primary_key = primary.map(|p| p.key);
    let stability_score = primary.map_or(0.0, |p| p.fraction);

    let average_confidence = if point_count == 0 {
        0.0
    } else {
        points.iter().map(|p| p.confidence).sum::<f64>() / point_count as f64
    };

    // Stable sort, so equal shares keep first-seen order.
    shares.sort_by(|a, b| b.fraction.total_cmp(&a.fraction));

    StabilitySummary {
        primary_key,
        stability_score,
        classification: primary_key.map(|_| StabilityClass::from_score(stability_score)),
        key_shares: shares,
        total_duration,
        point_count,
        transition_count: transitions.len(),
        average_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::WindowSize;
    use pretty_assertions::assert_eq;

    fn point(time: f64, window_end: f64, key: Key, confidence: f64) -> KeyAnalysisPoint {
        KeyAnalysisPoint {
            time,
            measure: None,
            window_start: time - 1.0,
            window_end,
            window_size: WindowSize::Seconds(2.0),
            key,
            confidence,
            combined_confidence: 1.0,
            evidence: Vec::new(),
            smoothed: false,
        }
    }

    #[test]
    fn empty_timeline_has_no_primary_key() {
        let summary = summarize(&[], &[]);
        assert_eq!(summary.primary_key, None);
        assert_eq!(summary.classification, None);
        assert_eq!(summary.label(), "No Primary Key");
        assert_eq!(summary.stability_score, 0.0);
        assert!(summary.key_shares.is_empty());
    }

    #[test]
    fn time_weighted_primary_key() {
        let c = Key::major(0);
        let a = Key::minor(9);
        let points = vec![
            point(1.0, 2.0, c, 0.8),
            point(2.0, 3.0, c, 0.8),
            point(3.0, 4.0, c, 0.8),
            point(4.0, 5.0, c, 0.8),
            point(5.0, 6.0, a, 0.9),
            point(6.0, 7.0, a, 0.9),
            point(7.0, 8.0, a, 0.9),
        ];
        let summary = summarize(&points, &[]);
        assert_eq!(summary.primary_key, Some(c));
        assert_eq!(summary.total_duration, 7.0);
        assert!((summary.stability_score - 4.0 / 7.0).abs() < 1e-12);
        assert_eq!(summary.classification, Some(StabilityClass::ModeratelyStable));
        assert_eq!(summary.key_shares[0].key, c);
        assert_eq!(summary.key_shares[1].seconds, 3.0);
        assert_eq!(summary.key_shares[1].points, 3);
        assert_eq!(summary.point_count, 7);
        assert!((summary.average_confidence - (3.2 + 2.7) / 7.0).abs() < 1e-12);
    }

    #[test]
    fn duration_beats_point_count() {
        let c = Key::major(0);
        let g = Key::major(7);
        // Two short C points and one long G point
        let points = vec![
            point(0.0, 1.0, c, 0.8),
            point(0.5, 1.5, c, 0.8),
            point(1.0, 10.0, g, 0.8),
        ];
        let summary = summarize(&points, &[]);
        assert_eq!(summary.primary_key, Some(g));
        assert_eq!(summary.classification, Some(StabilityClass::VeryStable));
    }

    #[test]
    fn silence_is_credited_to_no_key() {
        let c = Key::major(0);
        let g = Key::major(7);
        let mut points: Vec<_> = (1..5).map(|t| point(t as f64, t as f64 + 1.0, c, 0.8)).collect();
        points.extend((40..48).map(|t| point(t as f64, t as f64 + 1.0, g, 0.8)));
        let summary = summarize(&points, &[]);

        assert_eq!(summary.primary_key, Some(g));
        assert_eq!(summary.total_duration, 12.0);
        assert_eq!(summary.key_shares[0].seconds, 8.0);
        assert_eq!(summary.key_shares[1].key, c);
        assert_eq!(summary.key_shares[1].seconds, 4.0);
        assert!((summary.stability_score - 8.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn equal_shares_go_to_first_key() {
        let c = Key::major(0);
        let g = Key::major(7);
        let points = vec![point(0.0, 2.0, g, 0.8), point(1.0, 2.0, c, 0.8)];
        let summary = summarize(&points, &[]);
        assert_eq!(summary.primary_key, Some(g));
        assert_eq!(summary.key_shares[0].key, g);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(StabilityClass::from_score(1.0), StabilityClass::VeryStable);
        assert_eq!(StabilityClass::from_score(0.9), StabilityClass::VeryStable);
        assert_eq!(StabilityClass::from_score(0.7), StabilityClass::Stable);
        assert_eq!(StabilityClass::from_score(0.5), StabilityClass::ModeratelyStable);
        assert_eq!(StabilityClass::from_score(0.3), StabilityClass::Unstable);
        assert_eq!(StabilityClass::from_score(0.29), StabilityClass::HighlyUnstable);
        assert_eq!(StabilityClass::Unstable.label(), "Unstable");
    }
}
