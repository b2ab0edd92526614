use serde::{Deserialize, Serialize};

use crate::types::{Key, Mode};

/// Relationship between two stable keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModulationType {
    Dominant,
    Subdominant,
    StepwiseUp,
    StepwiseDown,
    ChromaticUp,
    ChromaticDown,
    Parallel { mode: Mode },
    Modal { from: Mode, to: Mode },
    RelativeMinor,
    RelativeMajor,
    ModeChange { from: Mode, to: Mode },
}

impl ModulationType {
    /// Human-readable label, e.g. "Dominant" or "Modal (major to minor)".
    pub fn label(&self) -> String {
        match self {
            ModulationType::Dominant => "Dominant".to_string(),
            ModulationType::Subdominant => "Subdominant".to_string(),
            ModulationType::StepwiseUp => "Step-wise Up".to_string(),
            ModulationType::StepwiseDown => "Step-wise Down".to_string(),
            ModulationType::ChromaticUp => "Chromatic Up".to_string(),
            ModulationType::ChromaticDown => "Chromatic Down".to_string(),
            ModulationType::Parallel { mode } => format!("Parallel {}", mode.title()),
            ModulationType::Modal { from, to } => format!("Modal ({} to {})", from, to),
            ModulationType::RelativeMinor => "Relative Minor".to_string(),
            ModulationType::RelativeMajor => "Relative Major".to_string(),
            ModulationType::ModeChange { from, to } => {
                format!("Mode Change ({} to {})", from.title(), to.title())
            }
        }
    }
}

impl std::fmt::Display for ModulationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Classify the move from one key to another. Total over all 576 pairs.
///
/// Rules are tried in priority order; `interval` is
/// `(to.root - from.root) mod 12`.
pub fn classify(from: Key, to: Key) -> ModulationType {
    let interval = (to.root + 12 - from.root) % 12;

    if from.mode == to.mode {
        return match interval {
            7 => ModulationType::Dominant,
            5 => ModulationType::Subdominant,
            2 => ModulationType::StepwiseUp,
            10 => ModulationType::StepwiseDown,
            1 => ModulationType::ChromaticUp,
            11 => ModulationType::ChromaticDown,
            _ => ModulationType::Parallel { mode: from.mode },
        };
    }

    if from.root == to.root {
        return ModulationType::Modal {
            from: from.mode,
            to: to.mode,
        };
    }

    match (from.mode, to.mode, interval) {
        // Interval 9 is the true relative minor (C major -> A minor).
        (Mode::Major, Mode::Minor, 3 | 9) => ModulationType::RelativeMinor,
        (Mode::Minor, Mode::Major, 9) => ModulationType::RelativeMajor,
        _ => ModulationType::ModeChange {
            from: from.mode,
            to: to.mode,
        },
    }
}
