//! Sliding-window key-center tracking over timed notes.
//!
//! Turns a collection of notes (pitch, start, end, velocity) into a
//! time-varying key estimate: per-window Krumhansl-Schmuckler correlation,
//! optionally outvoted by chord-root and melodic evidence, then stable-key
//! tracking, outlier smoothing and modulation classification.
//!
//! ```rust,no_run
//! use key_tracker::{AnalyzerConfig, Note, Piece, SlidingWindowTracker};
//!
//! let notes = vec![
//!     Note::new(48, 0.0, 4.0, 100),
//!     Note::new(52, 0.0, 4.0, 100),
//!     Note::new(55, 0.0, 4.0, 100),
//! ];
//! let piece = Piece::new(notes)?;
//! let tracker = SlidingWindowTracker::new(AnalyzerConfig::load()?)?;
//! let timeline = tracker.analyze(&piece);
//!
//! for point in &timeline.points {
//!     println!("{:.1}s {} ({:.2})", point.time, point.key, point.confidence);
//! }
//! println!("{}", timeline.summary.label());
//! # Ok::<(), key_tracker::Error>(())
//! ```
//!
//! MIDI decoding is not part of this crate; callers hand over plain notes
//! and, when known, tempo and time-signature events.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod evidence;
pub mod loader;
pub mod modulation;
pub mod piece;
pub mod profile;
pub mod scheduler;
pub mod stability;
pub mod summary;
pub mod timeline;
pub mod timing;
pub mod types;

pub use analyzer::{HeuristicAnalyzer, KeyAnalyzer, SlidingWindowTracker, WindowAnalysis};
pub use config::{AnalyzerConfig, ChordRootRule, EvidenceConfig};
pub use error::{Error, Result};
pub use loader::ConfigSources;
pub use modulation::{classify, ModulationType};
pub use piece::Piece;
pub use profile::{KeyProfiles, PitchClassProfile};
pub use scheduler::{AnalysisWindow, WindowSize, WindowingMode};
pub use summary::{StabilityClass, StabilitySummary};
pub use timeline::KeyTimeline;
pub use timing::{MeasureGrid, TempoChange, TimeSignatureChange};
pub use types::{
    Evidence, EvidenceMethod, Key, KeyAnalysisPoint, KeyEstimate, Mode, Note, TonalityTransition,
};

/// Analyze `piece` with a one-off tracker built from `config`.
pub fn analyze(piece: &Piece, config: AnalyzerConfig) -> Result<KeyTimeline> {
    let tracker = SlidingWindowTracker::new(config)?;
    Ok(tracker.analyze(piece))
}
