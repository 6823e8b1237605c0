//! Melody data structures and music-math helpers.
//!
//! This module provides the core types for representing transcribed melodies:
//! beat-denominated notes, the melody aggregate, persistence of a melody
//! library, and Standard MIDI File import/export.

mod library;
mod midi_export;
mod midi_import;
#[allow(clippy::module_inception)]
mod melody;
mod note;

pub use library::MelodyLibrary;
pub use midi_export::export_melody_to_midi;
pub use midi_import::{import_melody_from_midi, MidiImportError};
pub use melody::Melody;
pub use note::{Note, NoteId};

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Concert pitch reference: A4 = 440 Hz = MIDI note 69.
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI note number of A4 in the equal-tempered mapping.
pub const A4_MIDI_NOTE: i32 = 69;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Examples
///
/// ```
/// use humtui::melody::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4"); // Middle C
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Maps a frequency in Hz to the nearest equal-tempered MIDI note number.
///
/// Uses the standard log-frequency mapping with A4 = 440 Hz = MIDI 69.
/// Non-positive or non-finite frequencies map to a sentinel value of -1,
/// which lies outside every valid pitch range and is removed by the
/// transcriber's pitch filter.
pub fn midi_note_from_frequency(frequency: f64) -> i32 {
    if !frequency.is_finite() || frequency <= 0.0 {
        return -1;
    }
    (12.0 * (frequency / A4_FREQUENCY).log2() + A4_MIDI_NOTE as f64).round() as i32
}

/// Returns the equal-tempered frequency in Hz of a MIDI note number.
pub fn frequency_from_midi_note(note: u8) -> f64 {
    A4_FREQUENCY * 2f64.powf((note as i32 - A4_MIDI_NOTE) as f64 / 12.0)
}

/// Converts a duration in beats to seconds at the given tempo.
pub fn beats_to_seconds(beats: f64, tempo: f64) -> f64 {
    beats * 60.0 / tempo
}

/// Converts a duration in seconds to beats at the given tempo.
pub fn seconds_to_beats(seconds: f64, tempo: f64) -> f64 {
    seconds * tempo / 60.0
}
