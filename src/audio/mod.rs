//! Audio playback and rendering.
//!
//! Synthesis runs through a SoundFont synthesizer streamed to the default
//! output device via rodio; the session module owns the record/playback
//! state machine on top of it. Without a SoundFont the engine runs silent
//! and the rest of the application behaves identically.

pub mod engine;
pub mod export;
pub mod session;

pub use engine::SynthEngine;
pub use export::export_melody_to_wav;
pub use session::{AudioSession, SessionState};
