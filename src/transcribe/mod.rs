//! Pitch-to-note transcription.
//!
//! A pitch-tracking source delivers periodic (frequency, amplitude)
//! observations; the sampler thread buffers them at a fixed cadence and the
//! transcriber segments the buffer into discrete notes by run-length
//! scanning, then filters out fragments too short, too quiet, or outside
//! the singable pitch range.

mod sampler;
mod transcriber;

pub use sampler::{Sample, SampleSource, ScriptedSource};
pub use transcriber::{ConfigError, Transcriber, TranscriberConfig};
