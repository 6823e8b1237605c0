//! SoundFont synthesis engine.
//!
//! Provides a high-level interface for sounding melody notes using
//! rustysynth for synthesis and rodio for audio output. The melody voice
//! plays on channel 0; the metronome click uses the General MIDI percussion
//! channel.

use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Source};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// MIDI channel carrying the melody voice.
const MELODY_CHANNEL: i32 = 0;

/// General MIDI percussion channel, used for the metronome click.
const CLICK_CHANNEL: i32 = 9;

/// GM percussion note for the metronome: high wood block.
const CLICK_NOTE: i32 = 76;

/// Audio source that generates samples from the synthesizer.
/// Implements rodio's Source trait for playback.
struct SynthSource {
    synth: Arc<Mutex<Synthesizer>>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl SynthSource {
    fn new(synth: Arc<Mutex<Synthesizer>>) -> Self {
        Self {
            synth,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        // Render a new buffer when we've exhausted the current one
        if self.buf_pos >= BUFFER_SIZE {
            if let Ok(mut synth) = self.synth.lock() {
                synth.render(&mut self.left_buf, &mut self.right_buf);
            } else {
                // Only fill with silence if we can't get the lock
                self.left_buf.fill(0.0);
                self.right_buf.fill(0.0);
            }
            self.buf_pos = 0;
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
        }

        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        2 // Stereo
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite stream
    }
}

/// The melody synthesis engine.
///
/// Constructed with an optional SoundFont: without one the engine runs in
/// silent mode, where every call is a no-op. Playback timing, recording,
/// and editing do not depend on audibility.
pub struct SynthEngine {
    synth: Option<Arc<Mutex<Synthesizer>>>,
    /// Audio output stream (must be kept alive while playing).
    _stream: Option<OutputStream>,
    _stream_handle: Option<OutputStreamHandle>,
}

impl SynthEngine {
    /// Creates an engine backed by the given SoundFont.
    ///
    /// # Errors
    ///
    /// Returns error if the SoundFont cannot be read or is invalid, or if
    /// audio output cannot be initialized.
    pub fn new<P: AsRef<Path>>(soundfont_path: P) -> Result<Self> {
        let mut file = BufReader::new(File::open(soundfont_path.as_ref()).with_context(|| {
            format!(
                "Failed to open SoundFont: {}",
                soundfont_path.as_ref().display()
            )
        })?);
        let soundfont = Arc::new(
            SoundFont::new(&mut file)
                .map_err(|e| anyhow::anyhow!("Failed to load SoundFont: {:?}", e))?,
        );

        let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let synth = Synthesizer::new(&soundfont, &settings)
            .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;
        let synth = Arc::new(Mutex::new(synth));

        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;

        let source = SynthSource::new(Arc::clone(&synth));
        stream_handle
            .play_raw(source)
            .context("Failed to start audio playback")?;

        tracing::info!(
            soundfont = %soundfont_path.as_ref().display(),
            "synthesis engine ready"
        );

        Ok(Self {
            synth: Some(synth),
            _stream: Some(stream),
            _stream_handle: Some(stream_handle),
        })
    }

    /// Creates a silent engine: every sound call is a no-op.
    pub fn silent() -> Self {
        Self {
            synth: None,
            _stream: None,
            _stream_handle: None,
        }
    }

    /// Returns true if the engine can actually make sound.
    pub fn is_audible(&self) -> bool {
        self.synth.is_some()
    }

    /// Starts sounding a melody note.
    pub fn note_on(&self, pitch: u8, velocity: u8) {
        if let Some(synth) = &self.synth {
            if let Ok(mut synth) = synth.lock() {
                synth.note_on(MELODY_CHANNEL, pitch as i32, velocity as i32);
            }
        }
    }

    /// Stops a sounding melody note.
    pub fn note_off(&self, pitch: u8) {
        if let Some(synth) = &self.synth {
            if let Ok(mut synth) = synth.lock() {
                synth.note_off(MELODY_CHANNEL, pitch as i32);
            }
        }
    }

    /// Stops all sounding notes.
    ///
    /// # Arguments
    ///
    /// * `immediate` - If true, notes stop immediately without release
    pub fn all_notes_off(&self, immediate: bool) {
        if let Some(synth) = &self.synth {
            if let Ok(mut synth) = synth.lock() {
                synth.note_off_all(immediate);
            }
        }
    }

    /// Sounds one metronome click. Downbeats click louder.
    pub fn click(&self, downbeat: bool) {
        if let Some(synth) = &self.synth {
            if let Ok(mut synth) = synth.lock() {
                let velocity = if downbeat { 110 } else { 70 };
                synth.note_on(CLICK_CHANNEL, CLICK_NOTE, velocity);
            }
        }
    }

    /// Sets the melody instrument (program 0-127).
    pub fn set_program(&self, program: u8) {
        if let Some(synth) = &self.synth {
            if let Ok(mut synth) = synth.lock() {
                // Program change is MIDI command 0xC0
                synth.process_midi_message(MELODY_CHANNEL, 0xC0, program as i32, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_engine_is_inert() {
        // The silent engine must accept every call without a device
        let engine = SynthEngine::silent();
        assert!(!engine.is_audible());
        engine.note_on(60, 100);
        engine.note_off(60);
        engine.all_notes_off(true);
        engine.click(true);
        engine.set_program(5);
    }

    #[test]
    fn test_missing_soundfont_is_an_error() {
        assert!(SynthEngine::new("/nonexistent/path.sf2").is_err());
    }
}
