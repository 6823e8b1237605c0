//! Piano-roll geometry.
//!
//! Maps notes to axis-aligned boxes in a (beat, pitch-row) device space and
//! back, and hosts the gesture-driven editor that manipulates notes through
//! those boxes.

mod editor;

pub use editor::{GestureOp, NoteBox, RollEditor};

use crate::melody::Note;

/// An axis-aligned box in roll device coordinates.
///
/// X grows rightward with time, Y grows downward with falling pitch, as on
/// every piano-roll display.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RollRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RollRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// X coordinate of the right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Y coordinate of the bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the point lies inside the box (edges inclusive on the
    /// top/left, exclusive on the bottom/right).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Display-scale parameters of the roll.
///
/// These are view configuration, not musical constants: a TUI uses one cell
/// per pitch row while a pixel display uses taller rows, and both feed the
/// same editor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollMetrics {
    /// Device width of one beat column.
    pub beat_width: f64,
    /// Device height of one pitch row.
    pub note_height: f64,
}

impl Default for RollMetrics {
    fn default() -> Self {
        Self {
            beat_width: 80.0,
            note_height: 16.0,
        }
    }
}

impl RollMetrics {
    /// Converts a beat position to an X coordinate.
    pub fn x_from_beats(&self, beats: f64) -> f64 {
        beats * self.beat_width
    }

    /// Converts an X coordinate to a beat position.
    pub fn beats_from_x(&self, x: f64) -> f64 {
        x / self.beat_width
    }

    /// Converts a pitch to the Y coordinate of its row top.
    /// Row 0 is pitch 127; higher pitches sit higher on screen.
    pub fn y_from_pitch(&self, pitch: u8) -> f64 {
        self.note_height * (127 - pitch) as f64
    }

    /// Converts a Y coordinate to the pitch of the row containing it.
    /// The result is unclamped; Y positions outside the 128 rows map
    /// outside 0..=127.
    pub fn pitch_from_y(&self, y: f64) -> i32 {
        127 - (y / self.note_height).floor() as i32
    }

    /// Projects a note to its on-screen box.
    pub fn rect_from_note(&self, note: &Note) -> RollRect {
        RollRect::new(
            self.x_from_beats(note.onset),
            self.y_from_pitch(note.pitch),
            self.x_from_beats(note.duration),
            self.note_height,
        )
    }

    /// Total height of the full 128-row roll.
    pub fn roll_height(&self) -> f64 {
        self.note_height * 128.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_round_trip() {
        let metrics = RollMetrics::default();
        for beats in [0.0, 0.25, 1.0, 3.1875, 100.5] {
            let x = metrics.x_from_beats(beats);
            assert!((metrics.beats_from_x(x) - beats).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pitch_round_trip_is_row_snapped() {
        let metrics = RollMetrics::default();
        for pitch in [0u8, 30, 60, 69, 127] {
            let y = metrics.y_from_pitch(pitch);
            // Top of the row maps back exactly
            assert_eq!(metrics.pitch_from_y(y), pitch as i32);
            // Anywhere within the row maps back too: quantized to the row
            assert_eq!(metrics.pitch_from_y(y + metrics.note_height * 0.99), pitch as i32);
        }
    }

    #[test]
    fn test_higher_pitch_is_higher_on_screen() {
        let metrics = RollMetrics::default();
        assert!(metrics.y_from_pitch(72) < metrics.y_from_pitch(60));
        assert_eq!(metrics.y_from_pitch(127), 0.0);
    }

    #[test]
    fn test_rect_from_note() {
        let metrics = RollMetrics::default();
        let note = Note::new(60, 2.0, 0.5);
        let rect = metrics.rect_from_note(&note);
        assert_eq!(rect.x, 160.0);
        assert_eq!(rect.width, 40.0);
        assert_eq!(rect.y, metrics.y_from_pitch(60));
        assert_eq!(rect.height, 16.0);
    }

    #[test]
    fn test_rect_contains() {
        let rect = RollRect::new(10.0, 20.0, 30.0, 16.0);
        assert!(rect.contains(10.0, 20.0));
        assert!(rect.contains(39.9, 35.9));
        assert!(!rect.contains(40.0, 20.0));
        assert!(!rect.contains(10.0, 36.0));
        assert!(!rect.contains(9.9, 20.0));
    }
}
