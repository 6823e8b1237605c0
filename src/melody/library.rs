//! Melody library persistence.
//!
//! The library is the list of melodies the user has kept. It is stored as
//! pretty JSON for the user-visible save file and as bincode for the
//! autosave path, mirroring the double format of the project archive.

use super::Melody;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// An ordered collection of saved melodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MelodyLibrary {
    melodies: Vec<Melody>,
}

impl MelodyLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a melody to the end of the library.
    pub fn add(&mut self, melody: Melody) {
        self.melodies.push(melody);
    }

    /// Removes and returns the melody at `index`, or None if out of range.
    #[allow(dead_code)]
    pub fn remove(&mut self, index: usize) -> Option<Melody> {
        if index < self.melodies.len() {
            Some(self.melodies.remove(index))
        } else {
            None
        }
    }

    /// Returns the saved melodies in order.
    pub fn melodies(&self) -> &[Melody] {
        &self.melodies
    }

    /// Returns the number of saved melodies.
    pub fn len(&self) -> usize {
        self.melodies.len()
    }

    /// Returns true if no melodies are saved.
    pub fn is_empty(&self) -> bool {
        self.melodies.is_empty()
    }

    /// Serializes the library to pretty JSON.
    #[allow(dead_code)]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a library from JSON.
    #[allow(dead_code)]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Saves the library to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Loads a library from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading or parsing fails.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Saves the library in binary form (autosave path).
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let data = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, data)
    }

    /// Loads a library from its binary form.
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let data = fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::Note;

    fn sample_library() -> MelodyLibrary {
        let mut library = MelodyLibrary::new();
        library.add(Melody::demo());
        library.add(Melody::new(
            vec![Note::new(69, 0.0, 1.0)],
            90.0,
            Some("held A".to_string()),
        ));
        library
    }

    #[test]
    fn test_json_round_trip() {
        let library = sample_library();
        let json = library.to_json().unwrap();
        let loaded = MelodyLibrary::from_json(&json).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.melodies()[0].name, "Yankee Doodle");
        assert_eq!(loaded.melodies()[1].tempo, 90.0);
        assert_eq!(loaded.melodies()[1].notes()[0].pitch, 69);
    }

    #[test]
    fn test_binary_round_trip() {
        let library = sample_library();
        let data = bincode::serialize(&library).unwrap();
        let loaded: MelodyLibrary = bincode::deserialize(&data).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.melodies()[0].note_count(), 7);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut library = sample_library();
        assert!(library.remove(5).is_none());
        assert!(library.remove(0).is_some());
        assert_eq!(library.len(), 1);
    }
}
