//! Transcribed note representation.
//!
//! A note is a single sustained pitch with beat-denominated timing, as
//! produced by the transcriber or placed by hand in the roll editor.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique note IDs.
static NOTE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a note within a melody.
///
/// The roll editor matches its on-screen boxes back to notes through this ID
/// instead of relying on pointer identity, so notes can stay plain values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(u64);

impl NoteId {
    /// Generates a new unique note ID.
    ///
    /// Thread-safe: uses atomic increment internally.
    pub fn new() -> Self {
        Self(NOTE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value (for serialization/debugging).
    #[allow(dead_code)]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

/// A single transcribed note.
///
/// Onset and duration are measured in beats rather than wall-clock time, so
/// a melody keeps its shape when the tempo changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for this note instance.
    pub id: NoteId,

    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,

    /// Position of the note-on in beats from the start of the melody.
    pub onset: f64,

    /// Length of the note in beats. Positive once committed to a melody.
    pub duration: f64,
}

impl Note {
    /// Creates a new note with the given parameters.
    ///
    /// # Arguments
    ///
    /// * `pitch` - MIDI note number (0-127, clamped)
    /// * `onset` - Start position in beats
    /// * `duration` - Length in beats
    pub fn new(pitch: u8, onset: f64, duration: f64) -> Self {
        Self {
            id: NoteId::new(),
            pitch: pitch.min(127),
            onset,
            duration,
        }
    }

    /// Returns the note-off position in beats (onset + duration).
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }

    /// Checks if this note is sounding at a specific beat position.
    #[allow(dead_code)]
    pub fn is_active_at(&self, beat: f64) -> bool {
        beat >= self.onset && beat < self.end()
    }

    /// Transposes the note by a number of semitones.
    ///
    /// Returns true if the transposition succeeded (note stays in 0-127).
    #[allow(dead_code)]
    pub fn transpose(&mut self, semitones: i8) -> bool {
        let new_pitch = self.pitch as i16 + semitones as i16;
        if (0..=127).contains(&new_pitch) {
            self.pitch = new_pitch as u8;
            true
        } else {
            false
        }
    }
}
