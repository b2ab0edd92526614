use std::collections::VecDeque;

use tracing::{debug, info};

use crate::modulation::classify;
use crate::types::{Key, KeyAnalysisPoint, TonalityTransition};

#[derive(Debug, Clone, Copy)]
struct Buffered {
    time: f64,
    key: Key,
    confidence: f64,
}

/// Trailing-buffer majority vote over per-window estimates.
///
/// Points must arrive in chronological order. Once the buffer holds
/// `capacity` estimates, a key agreed on by at least `capacity - 1` of them
/// becomes the stable key; replacing an earlier stable key records a
/// [`TonalityTransition`].
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    capacity: usize,
    buffer: VecDeque<Buffered>,
    stable_key: Option<Key>,
    transitions: Vec<TonalityTransition>,
}

impl StabilityTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
            stable_key: None,
            transitions: Vec::new(),
        }
    }

    /// Feed the next point. Returns the transition it triggered, if any.
    pub fn update(&mut self, point: &KeyAnalysisPoint) -> Option<&TonalityTransition> {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(Buffered {
            time: point.time,
            key: point.key,
            confidence: point.confidence,
        });

        if self.buffer.len() < self.capacity {
            return None;
        }

        let (candidate, count) = self.buffer_mode()?;
        if count + 1 < self.capacity || self.stable_key == Some(candidate) {
            return None;
        }

        let previous = self.stable_key.replace(candidate);
        let Some(from_key) = previous else {
            info!(key = %candidate, time = point.time, "stable key established");
            return None;
        };

        let carrying: Vec<&Buffered> = self.buffer.iter().filter(|b| b.key == candidate).collect();
        let from_time = carrying.first().map_or(point.time, |b| b.time);
        let strength =
            carrying.iter().map(|b| b.confidence).sum::<f64>() / carrying.len().max(1) as f64;

        let transition = TonalityTransition {
            from_time,
            to_time: point.time,
            from_key,
            to_key: candidate,
            strength,
            modulation: classify(from_key, candidate),
        };
        info!(
            from = %transition.from_key,
            to = %transition.to_key,
            at = transition.to_time,
            modulation = %transition.modulation,
            "key change"
        );
        self.transitions.push(transition);
        self.transitions.last()
    }

    pub fn stable_key(&self) -> Option<Key> {
        self.stable_key
    }

    pub fn transitions(&self) -> &[TonalityTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TonalityTransition> {
        self.transitions
    }

    /// Most frequent key in the buffer; ties go to the most recently seen.
    fn buffer_mode(&self) -> Option<(Key, usize)> {
        let mut counts: Vec<(Key, usize)> = Vec::new();
        // Newest first, so the first key to reach a count wins ties.
        for entry in self.buffer.iter().rev() {
            match counts.iter_mut().find(|(key, _)| *key == entry.key) {
                Some(slot) => slot.1 += 1,
                None => counts.push((entry.key, 1)),
            }
        }
        let mut best: Option<(Key, usize)> = None;
        for (key, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        best
    }
}

/// Rewrite isolated single-window flips in place.
///
/// An interior point whose neighbours agree with each other but not with it,
/// and whose confidence is below `threshold + margin`, takes the neighbours'
/// key. Points are visited left to right, so an earlier rewrite is what the
/// next point sees as its left neighbour. Returns the number of points changed.
pub fn smooth_outliers(points: &mut [KeyAnalysisPoint], threshold: f64, margin: f64) -> usize {
    let mut changed = 0;
    if points.len() < 3 {
        return changed;
    }

    for i in 1..points.len() - 1 {
        let prev = points[i - 1].key;
        let next = points[i + 1].key;
        let current = &mut points[i];
        if prev == next && current.key != prev && current.confidence < threshold + margin {
            debug!(
                time = current.time,
                from = %current.key,
                to = %prev,
                confidence = current.confidence,
                "smoothed outlier"
            );
            current.key = prev;
            current.smoothed = true;
            changed += 1;
        }
    }
    changed
}
