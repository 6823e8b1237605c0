//! Application state and input handling.
//!
//! The App owns the one open melody; the roll editor and the audio session
//! both operate on it by borrow, so an edit made through one is immediately
//! visible through the other.

use crate::audio::{export_melody_to_wav, AudioSession};
use crate::melody::{
    export_melody_to_midi, frequency_from_midi_note, Melody, MelodyLibrary, Note,
};
use crate::roll::{RollEditor, RollMetrics};
use crate::transcribe::{Sample, SampleSource};
use ratatui::layout::Rect;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How long status messages stay visible.
const STATUS_DURATION: Duration = Duration::from_secs(4);

/// Horizontal device units (terminal cells) per beat on the TUI roll.
const CELLS_PER_BEAT: f64 = 8.0;

/// Pitch row the view is centered on at startup.
const HOME_PITCH: u8 = 72; // C5

/// A simulated singer for the --sim-input flag: walks up a C major arpeggio,
/// holding each tone and breathing between them. Stands in for the external
/// pitch tracker so the whole record-transcribe-edit loop can be exercised
/// without a microphone.
pub struct SimVoice {
    tick: u64,
    ticks_per_tone: u64,
    ticks_of_rest: u64,
}

impl SimVoice {
    /// `sample_rate` is the transcriber cadence the source will be polled at.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            tick: 0,
            // Hold each tone ~0.4 s, rest ~0.15 s
            ticks_per_tone: (sample_rate * 0.4).max(1.0) as u64,
            ticks_of_rest: (sample_rate * 0.15).max(1.0) as u64,
        }
    }
}

impl SampleSource for SimVoice {
    fn sample(&mut self) -> Sample {
        const PHRASE: [u8; 8] = [60, 64, 67, 72, 67, 64, 60, 55];

        let cycle = self.ticks_per_tone + self.ticks_of_rest;
        let tone = ((self.tick / cycle) as usize) % PHRASE.len();
        let voiced = self.tick % cycle < self.ticks_per_tone;
        self.tick += 1;

        Sample {
            frequency: frequency_from_midi_note(PHRASE[tone]),
            amplitude: if voiced { 0.6 } else { 0.02 },
        }
    }
}

/// Top-level application state.
pub struct App {
    pub melody: Melody,
    pub session: AudioSession,
    pub editor: RollEditor,

    /// Device-space scroll origin of the roll viewport.
    pub scroll_x: f64,
    pub scroll_y: f64,

    /// Grid region of the last rendered frame, for mouse hit testing.
    pub grid_area: Rect,

    pub should_quit: bool,

    /// In-progress tempo entry, when the user is typing one.
    pub tempo_entry: Option<String>,

    status: Option<(String, Instant)>,
    modified: bool,

    /// Buffered observation count of the running take, for the status bar.
    pub live_samples: usize,

    sim_input: bool,
    library_path: PathBuf,
    soundfont_path: Option<PathBuf>,
    /// Which library slot the last load came from, for cycling.
    library_cursor: usize,
}

/// Binary autosave written on quit and recovered on the next start.
pub const AUTOSAVE_PATH: &str = ".humtui-autosave.bin";

impl App {
    pub fn new(
        session: AudioSession,
        melody: Melody,
        sim_input: bool,
        library_path: PathBuf,
        soundfont_path: Option<PathBuf>,
    ) -> Self {
        let metrics = RollMetrics {
            beat_width: CELLS_PER_BEAT,
            note_height: 1.0,
        };
        let mut editor = RollEditor::new(metrics);
        editor.open_melody(&melody);

        let scroll_y = metrics.y_from_pitch(HOME_PITCH);

        Self {
            melody,
            session,
            editor,
            scroll_x: 0.0,
            scroll_y,
            grid_area: Rect::default(),
            should_quit: false,
            tempo_entry: None,
            status: None,
            modified: false,
            live_samples: 0,
            sim_input,
            library_path,
            soundfont_path,
            library_cursor: 0,
        }
    }

    // -- status line ------------------------------------------------------

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|(m, _)| m.as_str())
    }

    pub fn clear_expired_status(&mut self) {
        if let Some((_, at)) = &self.status {
            if at.elapsed() > STATUS_DURATION {
                self.status = None;
            }
        }
    }

    // -- transport --------------------------------------------------------

    /// Starts or stops a recording take.
    pub fn toggle_recording(&mut self) {
        if self.session.is_recording() {
            let added = self.session.stop_recording(&mut self.melody);
            self.editor.refresh(&self.melody);
            self.modified = self.modified || added > 0;
            self.set_status(format!("Recording stopped: {} notes added", added));
        } else if self.sim_input {
            let rate = self.session.transcriber_mut().config().sample_rate;
            self.session.start_recording(SimVoice::new(rate));
            self.set_status("Recording (simulated voice)...");
        } else {
            // The pitch tracker is an external collaborator; without one
            // there is nothing to sample.
            self.set_status("No input source configured: run with --sim-input");
        }
    }

    /// Starts or stops playback.
    pub fn toggle_playback(&mut self) {
        if self.session.is_playing() {
            self.session.stop_playback();
            self.set_status("Playback stopped");
        } else {
            let was_recording = self.session.is_recording();
            self.session.start_playback(&mut self.melody);
            if was_recording {
                self.editor.refresh(&self.melody);
            }
            if self.session.is_playing() {
                self.set_status("Playing");
            } else {
                self.set_status("Nothing to play");
            }
        }
    }

    /// Per-frame tick: advances the session and follows the playhead.
    pub fn update(&mut self) {
        self.session.update(&self.melody);
        self.clear_expired_status();

        if self.session.is_recording() {
            self.live_samples = self.session.transcriber_mut().sample_count();
        }

        // Follow the playhead once it passes three quarters of the view
        if self.session.is_playing() && self.grid_area.width > 0 {
            let metrics = *self.editor.metrics();
            let head_x = metrics.x_from_beats(self.session.playhead());
            let width = self.grid_area.width as f64;
            if head_x > self.scroll_x + width * 0.75 {
                // Keep the origin on a whole cell so gridlines stay put
                self.scroll_x = (head_x - width * 0.25).max(0.0).floor();
            }
        }
    }

    // -- editing ----------------------------------------------------------

    /// Deletes the selected note, if any.
    pub fn delete_selected(&mut self) {
        if self.editor.delete_selected(&mut self.melody) {
            self.modified = true;
            self.set_status("Note deleted");
        }
    }

    /// Inserts a quarter note at the playhead, one octave below the top of
    /// the view, and selects nothing (the box appears on refresh).
    pub fn insert_note(&mut self) {
        let pitch = HOME_PITCH.saturating_sub(12);
        let onset = self.session.playhead().max(0.0);
        self.melody.add_note(Note::new(pitch, onset, 1.0));
        self.editor.refresh(&self.melody);
        self.modified = true;
        self.set_status("Note inserted at playhead");
    }

    // -- tempo entry ------------------------------------------------------

    pub fn start_tempo_entry(&mut self) {
        self.tempo_entry = Some(String::new());
    }

    pub fn tempo_entry_input(&mut self, c: char) {
        if let Some(entry) = &mut self.tempo_entry {
            if c.is_ascii_digit() || c == '.' {
                entry.push(c);
            }
        }
    }

    pub fn tempo_entry_backspace(&mut self) {
        if let Some(entry) = &mut self.tempo_entry {
            entry.pop();
        }
    }

    pub fn cancel_tempo_entry(&mut self) {
        self.tempo_entry = None;
    }

    /// Applies the typed tempo. Values outside (0, 400) are rejected and
    /// the previous tempo kept.
    pub fn confirm_tempo_entry(&mut self) {
        let Some(entry) = self.tempo_entry.take() else {
            return;
        };
        match entry.parse::<f64>() {
            Ok(tempo) if tempo > 0.0 && tempo < 400.0 => {
                self.melody.tempo = tempo;
                self.modified = true;
                self.set_status(format!("Tempo set to {:.0} BPM", tempo));
            }
            _ => {
                self.set_status(format!(
                    "Invalid tempo '{}': must be between 0 and 400",
                    entry
                ));
            }
        }
    }

    // -- pointer plumbing --------------------------------------------------

    /// Translates a terminal cell inside the grid to roll device space.
    fn device_point(&self, column: u16, row: u16) -> Option<(f64, f64)> {
        let area = self.grid_area;
        if column < area.x
            || column >= area.x + area.width
            || row < area.y
            || row >= area.y + area.height
        {
            return None;
        }
        let x = self.scroll_x + (column - area.x) as f64;
        let y = self.scroll_y + (row - area.y) as f64;
        Some((x, y))
    }

    /// Pointer pressed. A hit starts a gesture on the struck box; a miss
    /// moves the playhead to the clicked beat.
    pub fn pointer_down(&mut self, column: u16, row: u16) {
        let Some((x, y)) = self.device_point(column, row) else {
            return;
        };
        if !self.editor.pointer_down(x, y) {
            let beats = self.editor.metrics().beats_from_x(x).max(0.0);
            self.session.seek(beats);
        }
    }

    /// Pointer dragged. Feeds the active gesture; a drag with no gesture is
    /// a silent no-op inside the editor.
    pub fn pointer_drag(&mut self, column: u16, row: u16) {
        let Some((x, y)) = self.device_point(column, row) else {
            return;
        };
        if self.editor.pointer_moved(&mut self.melody, x, y) {
            self.modified = true;
        }
    }

    /// Pointer released: the gesture ends, the selection survives.
    pub fn pointer_up(&mut self) {
        self.editor.pointer_up();
    }

    // -- viewport ----------------------------------------------------------

    pub fn scroll_by(&mut self, dx: f64, dy: f64) {
        let metrics = *self.editor.metrics();
        self.scroll_x = (self.scroll_x + dx).max(0.0);
        let max_y = (metrics.roll_height() - self.grid_area.height as f64).max(0.0);
        self.scroll_y = (self.scroll_y + dy).clamp(0.0, max_y);
    }

    pub fn scroll_home(&mut self) {
        self.scroll_x = 0.0;
        self.scroll_y = self.editor.metrics().y_from_pitch(HOME_PITCH);
    }

    // -- persistence & export ---------------------------------------------

    /// Snapshots the open melody into the library file.
    pub fn save_to_library(&mut self) {
        let mut library = MelodyLibrary::load_from_file(&self.library_path).unwrap_or_default();
        library.add(self.melody.clone());
        match library.save_to_file(&self.library_path) {
            Ok(()) => {
                self.modified = false;
                self.set_status(format!(
                    "Saved '{}' to {} ({} total)",
                    self.melody.name,
                    self.library_path.display(),
                    library.len()
                ));
            }
            Err(e) => self.set_status(format!("Save failed: {}", e)),
        }
    }

    /// Loads the next melody from the library file, cycling through slots.
    pub fn load_from_library(&mut self) {
        match MelodyLibrary::load_from_file(&self.library_path) {
            Ok(library) if !library.is_empty() => {
                let index = self.library_cursor % library.len();
                self.library_cursor = self.library_cursor.wrapping_add(1);
                let loaded = library.melodies()[index].clone();
                self.set_status(format!("Loaded {}", loaded.describe()));
                self.open_melody(loaded);
            }
            Ok(_) => self.set_status("Library is empty"),
            Err(e) => self.set_status(format!("Load failed: {}", e)),
        }
    }

    /// Replaces the open melody, resetting the editor and playhead.
    pub fn open_melody(&mut self, melody: Melody) {
        self.session.stop_playback();
        self.melody = melody;
        self.editor.open_melody(&self.melody);
        self.session.seek(0.0);
        self.scroll_x = 0.0;
        self.modified = false;
    }

    /// Writes the melody to `<name>.mid` in the working directory.
    pub fn export_midi(&mut self) {
        let path = PathBuf::from(format!("{}.mid", sanitize_filename(&self.melody.name)));
        match export_melody_to_midi(&self.melody, &path) {
            Ok(()) => self.set_status(format!("Exported {}", path.display())),
            Err(e) => self.set_status(format!("MIDI export failed: {}", e)),
        }
    }

    /// Renders the melody to `<name>.wav`. Needs the SoundFont.
    pub fn export_wav(&mut self) {
        let Some(soundfont) = self.soundfont_path.clone() else {
            self.set_status("WAV export needs a SoundFont: run with --soundfont");
            return;
        };
        let path = PathBuf::from(format!("{}.wav", sanitize_filename(&self.melody.name)));
        match export_melody_to_wav(&self.melody, &soundfont, &path) {
            Ok(()) => self.set_status(format!("Exported {}", path.display())),
            Err(e) => self.set_status(format!("WAV export failed: {}", e)),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Winds down any running session before exit. A recording in flight is
    /// transcribed and merged so the autosave can capture it.
    pub fn prepare_quit(&mut self) {
        self.session.stop_playback();
        let added = self.session.stop_recording(&mut self.melody);
        if added > 0 {
            self.editor.refresh(&self.melody);
            self.modified = true;
        }
        self.should_quit = true;
    }

    /// Writes the open melody to the binary autosave if it has unsaved
    /// edits. Called on quit.
    pub fn autosave(&mut self) {
        if !self.modified {
            return;
        }
        let mut library = MelodyLibrary::new();
        library.add(self.melody.clone());
        match library.save_to_binary(AUTOSAVE_PATH) {
            Ok(()) => tracing::info!("autosaved to {}", AUTOSAVE_PATH),
            Err(e) => tracing::warn!("autosave failed: {}", e),
        }
    }

    /// Recovers the melody from the binary autosave, if one exists.
    /// The autosave file is consumed either way.
    pub fn try_load_autosave(&mut self) {
        let path = std::path::Path::new(AUTOSAVE_PATH);
        if !path.exists() {
            return;
        }
        match MelodyLibrary::load_from_binary(path) {
            Ok(library) if !library.is_empty() => {
                let recovered = library.melodies()[0].clone();
                self.set_status(format!("Recovered {}", recovered.describe()));
                self.open_melody(recovered);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("could not read autosave: {}", e),
        }
        let _ = std::fs::remove_file(path);
    }

    /// One-line summary of the transcription settings for the status bar.
    pub fn session_config_summary(&self) -> String {
        let config = self.session.transcriber().config();
        format!(
            "amp>={:.2}  dur>={:.2}  pitch {}..{}  {} Hz{}",
            config.threshold_amp,
            config.threshold_dur,
            config.threshold_note,
            config.ceiling_note,
            config.sample_rate,
            if self.session.is_audible() {
                ""
            } else {
                "  [silent: no soundfont]"
            }
        )
    }
}

/// Makes a melody name safe to use as a file stem.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "melody".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SynthEngine;

    fn test_app() -> App {
        App::new(
            AudioSession::new(SynthEngine::silent()),
            Melody::demo(),
            false,
            PathBuf::from("/tmp/humtui-test-library.json"),
            None,
        )
    }

    #[test]
    fn test_tempo_validation_retains_prior() {
        let mut app = test_app();
        let prior = app.melody.tempo;

        app.start_tempo_entry();
        for c in "500".chars() {
            app.tempo_entry_input(c);
        }
        app.confirm_tempo_entry();
        assert_eq!(app.melody.tempo, prior); // Out of range, rejected

        app.start_tempo_entry();
        for c in "96.5".chars() {
            app.tempo_entry_input(c);
        }
        app.confirm_tempo_entry();
        assert!((app.melody.tempo - 96.5).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_entry_filters_characters() {
        let mut app = test_app();
        app.start_tempo_entry();
        for c in "1a2b0".chars() {
            app.tempo_entry_input(c);
        }
        assert_eq!(app.tempo_entry.as_deref(), Some("120"));
    }

    #[test]
    fn test_insert_note_lands_at_playhead() {
        let mut app = test_app();
        let before = app.melody.note_count();
        app.session.seek(2.5);
        app.insert_note();
        assert_eq!(app.melody.note_count(), before + 1);
        let inserted = app.melody.notes().last().unwrap();
        assert!((inserted.onset - 2.5).abs() < 1e-9);
        assert_eq!(app.editor.boxes().len(), app.melody.note_count());
    }

    #[test]
    fn test_recording_without_source_reports() {
        let mut app = test_app();
        app.toggle_recording();
        assert!(!app.session.is_recording());
        assert!(app.status().unwrap().contains("--sim-input"));
    }

    #[test]
    fn test_sim_voice_alternates_tone_and_rest() {
        let mut voice = SimVoice::new(32.0);
        let samples: Vec<Sample> = (0..64).map(|_| voice.sample()).collect();
        assert!(samples.iter().any(|s| s.amplitude > 0.5));
        assert!(samples.iter().any(|s| s.amplitude < 0.1));
        // First tone is middle C
        assert!((samples[0].frequency - frequency_from_midi_note(60)).abs() < 1e-6);
    }

    #[test]
    fn test_open_melody_resets_view() {
        let mut app = test_app();
        app.scroll_x = 100.0;
        app.open_melody(Melody::empty());
        assert_eq!(app.scroll_x, 0.0);
        assert!(app.melody.is_empty());
        assert!(app.editor.boxes().is_empty());
        assert!(!app.is_modified());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("take 10:42"), "take_10_42");
        assert_eq!(sanitize_filename(""), "melody");
    }
}
