//! humtui - a terminal melody notepad.
//!
//! This library provides the core functionality for the app: pitch-to-note
//! transcription, the melody model, the piano-roll editing geometry, and
//! SoundFont playback.

pub mod app;
pub mod audio;
pub mod melody;
pub mod roll;
pub mod transcribe;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use audio::{AudioSession, SessionState, SynthEngine};
pub use melody::{Melody, MelodyLibrary, Note, NoteId};
pub use roll::{RollEditor, RollMetrics};
pub use transcribe::{Sample, SampleSource, Transcriber, TranscriberConfig};
