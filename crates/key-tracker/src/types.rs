use serde::{Deserialize, Serialize};

use crate::modulation::ModulationType;
use crate::scheduler::WindowSize;

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Pitch classes conventionally spelled with flats.
const FLAT_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb

/// A single note as handed over by the MIDI-parsing collaborator.
///
/// Times are in seconds. The analyzer only ever reads notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub start: f64,
    pub end: f64,
    pub velocity: u8,
    /// Source track or voice, when the collaborator knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<usize>,
}

impl Note {
    pub fn new(pitch: u8, start: f64, end: f64, velocity: u8) -> Self {
        Self {
            pitch,
            start,
            end,
            velocity,
            track: None,
        }
    }

    pub fn with_track(mut self, track: usize) -> Self {
        self.track = Some(track);
        self
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Seconds of this note inside `[start, end)`, zero when disjoint.
    pub fn overlap(&self, start: f64, end: f64) -> f64 {
        (self.end.min(end) - self.start.max(start)).max(0.0)
    }

    /// Whether the note is sounding at `time` (onset inclusive, release exclusive).
    pub fn sounding_at(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    /// Search order used everywhere a tie must be broken: major before minor.
    pub const ALL: [Mode; 2] = [Mode::Major, Mode::Minor];

    /// Capitalized name, as used in modulation labels.
    pub fn title(&self) -> &'static str {
        match self {
            Mode::Major => "Major",
            Mode::Minor => "Minor",
        }
    }

    /// Diatonic scale degrees above the tonic (natural minor for `Minor`).
    pub fn scale_degrees(&self) -> [u8; 7] {
        match self {
            Mode::Major => [0, 2, 4, 5, 7, 9, 11],
            Mode::Minor => [0, 2, 3, 5, 7, 8, 10],
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Major => write!(f, "major"),
            Mode::Minor => write!(f, "minor"),
        }
    }
}

/// A tonal center: root pitch class plus mode.
///
/// The derived ordering (root ascending, then major before minor) is the
/// stable iteration order used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    /// Pitch class 0–11 (C=0, C#=1, ...)
    pub root: u8,
    pub mode: Mode,
}

impl Key {
    pub fn new(root: u8, mode: Mode) -> Self {
        Self {
            root: root % 12,
            mode,
        }
    }

    pub fn major(root: u8) -> Self {
        Self::new(root, Mode::Major)
    }

    pub fn minor(root: u8) -> Self {
        Self::new(root, Mode::Minor)
    }

    /// All 24 keys in stable order: C major, C minor, C# major, ...
    pub fn all() -> impl Iterator<Item = Key> {
        (0..12u8).flat_map(|root| Mode::ALL.into_iter().map(move |mode| Key { root, mode }))
    }

    pub fn transpose(&self, semitones: i32) -> Self {
        Self::new((self.root as i32 + semitones).rem_euclid(12) as u8, self.mode)
    }

    /// Whether `pitch_class` belongs to this key's diatonic scale.
    pub fn contains(&self, pitch_class: u8) -> bool {
        let degree = (pitch_class % 12 + 12 - self.root) % 12;
        self.mode.scale_degrees().contains(&degree)
    }

    /// Root name with conventional flat spelling for Db, Eb, F, Gb, Ab and Bb.
    pub fn spelled_root(&self) -> &'static str {
        if FLAT_ROOTS.contains(&self.root) {
            NOTE_NAMES_FLAT[self.root as usize]
        } else {
            NOTE_NAMES_SHARP[self.root as usize]
        }
    }

    /// Root name using sharps only.
    pub fn root_name(&self) -> &'static str {
        NOTE_NAMES_SHARP[self.root as usize]
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.root_name(), self.mode)
    }
}

/// A scored key candidate. `confidence` is whatever the producing method
/// reports; for the correlator it is the raw Pearson coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    pub key: Key,
    pub confidence: f64,
}

/// Independent sources of key evidence inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceMethod {
    PitchClass,
    ChordRoot,
    Melodic,
}

impl EvidenceMethod {
    pub fn label(&self) -> &'static str {
        match self {
            EvidenceMethod::PitchClass => "pitch_class",
            EvidenceMethod::ChordRoot => "chord_root",
            EvidenceMethod::Melodic => "melodic",
        }
    }
}

/// One source's contribution to a window's vote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub method: EvidenceMethod,
    pub key: Key,
    pub confidence: f64,
    /// `confidence × method reliability`
    pub weight: f64,
}

/// A confirmed per-window key estimate anchored on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyAnalysisPoint {
    /// Window center, in seconds
    pub time: f64,
    /// 1-based measure containing the window center (measure mode only)
    pub measure: Option<u32>,
    pub window_start: f64,
    pub window_end: f64,
    pub window_size: WindowSize,
    pub key: Key,
    /// Pearson correlation of the window profile with `key`
    pub confidence: f64,
    /// Winning share of the weighted evidence vote
    pub combined_confidence: f64,
    pub evidence: Vec<Evidence>,
    /// Set when the smoothing pass rewrote `key`
    #[serde(default)]
    pub smoothed: bool,
}

impl KeyAnalysisPoint {
    pub fn root(&self) -> u8 {
        self.key.root
    }

    pub fn mode(&self) -> Mode {
        self.key.mode
    }
}

/// A change of stable key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TonalityTransition {
    /// Earliest buffered estimate that already carried the new key
    pub from_time: f64,
    /// Point at which the new key was confirmed
    pub to_time: f64,
    pub from_key: Key,
    pub to_key: Key,
    /// Mean confidence of the buffered estimates carrying the new key
    pub strength: f64,
    pub modulation: ModulationType,
}
