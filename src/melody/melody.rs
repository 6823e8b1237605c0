//! Melody container.
//!
//! A melody is an ordered collection of notes at a fixed tempo. Note order
//! is insertion order; `join` re-establishes temporal order after an overdub.

use super::note::{Note, NoteId};
use super::{beats_to_seconds, note_to_name};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default tempo in beats per minute for new melodies.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// A recorded or hand-edited melody.
///
/// The melody that is open in the editor is the same value the playback
/// session reads from; there is exactly one owner (the App) and all other
/// components borrow it per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Melody {
    /// Human-readable name, defaults to a timestamp-derived label.
    pub name: String,

    /// Tempo in beats per minute. Validity (0, 400) is enforced at the UI
    /// boundary, not here.
    pub tempo: f64,

    /// Notes in insertion order, except directly after `join` which leaves
    /// them sorted by onset.
    notes: Vec<Note>,
}

impl Melody {
    /// Creates a melody from parts.
    ///
    /// # Arguments
    ///
    /// * `notes` - Initial note list (insertion order preserved)
    /// * `tempo` - Tempo in beats per minute
    /// * `name` - Optional name; a timestamp-derived default is used if None
    pub fn new(notes: Vec<Note>, tempo: f64, name: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_else(generate_default_name),
            tempo,
            notes,
        }
    }

    /// Creates an empty melody at the default tempo.
    pub fn empty() -> Self {
        Self::new(Vec::new(), DEFAULT_TEMPO, None)
    }

    /// A canned demonstration melody (the opening of "Yankee Doodle").
    /// Useful as fixture data for tests and the --demo flag.
    pub fn demo() -> Self {
        let pitches: [u8; 7] = [60, 60, 62, 64, 60, 64, 62];
        let durations: [f64; 7] = [0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 1.0];
        let onsets: [f64; 7] = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0];

        let notes = (0..pitches.len())
            .map(|i| Note::new(pitches[i], onsets[i], durations[i]))
            .collect();

        Self::new(notes, 50.0, Some("Yankee Doodle".to_string()))
    }

    /// Returns the total length of the melody in beats: the maximum
    /// `onset + duration` over all notes, or 0 for an empty melody.
    pub fn duration(&self) -> f64 {
        self.notes.iter().map(Note::end).fold(0.0, f64::max)
    }

    /// Returns the total length of the melody in seconds at its own tempo.
    pub fn duration_seconds(&self) -> f64 {
        beats_to_seconds(self.duration(), self.tempo)
    }

    /// Appends all notes of `other`, then stably sorts the combined list by
    /// onset. The stable sort keeps simultaneous notes in concatenation
    /// order, so an overdub settles into temporal order without reshuffling
    /// chords arbitrarily.
    pub fn join(&mut self, mut other: Melody) {
        self.notes.append(&mut other.notes);
        self.notes.sort_by(|a, b| {
            a.onset
                .partial_cmp(&b.onset)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Adds a note, preserving insertion order.
    pub fn add_note(&mut self, note: Note) -> NoteId {
        let id = note.id;
        self.notes.push(note);
        id
    }

    /// Removes a note by its ID. Returns the removed note, or None if the ID
    /// is not present.
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let pos = self.notes.iter().position(|n| n.id == id)?;
        Some(self.notes.remove(pos))
    }

    /// Returns a reference to a note by its ID.
    #[allow(dead_code)]
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Returns a mutable reference to a note by its ID.
    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    /// Returns all notes in their current order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Returns the number of notes.
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Returns true if the melody has no notes.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// One-line description for the status bar and library listing.
    pub fn describe(&self) -> String {
        match self.notes.iter().map(|n| n.pitch).max() {
            Some(top) => format!(
                "{}: {} notes, {:.0} BPM, top {}",
                self.name,
                self.notes.len(),
                self.tempo,
                note_to_name(top)
            ),
            None => format!("{}: empty, {:.0} BPM", self.name, self.tempo),
        }
    }
}

impl Default for Melody {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builds the timestamp-derived default melody name.
fn generate_default_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    // Derive a wall-clock-ish label without pulling in a date crate
    let (h, m) = ((secs / 3600) % 24, (secs / 60) % 60);
    format!("take {:02}:{:02}", h, m)
}
