//! Recording/playback session orchestration.
//!
//! One session runs at a time: starting a recording while playback runs
//! (or vice versa) gracefully stops the other first. Playback sequencing is
//! cooperative: the event loop calls [`AudioSession::update`] every frame
//! and the session emits the note events the playhead crossed since the
//! previous frame, stopping itself when it passes the end of the melody.

use super::engine::SynthEngine;
use crate::melody::{seconds_to_beats, Melody};
use crate::transcribe::{SampleSource, Transcriber};
use std::time::Instant;

/// What the session is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Playback,
}

/// How close (in seconds) the playhead may sit to the end of the melody
/// before starting playback rewinds to the beginning instead.
const REWIND_WINDOW_SECONDS: f64 = 0.05;

/// Playback velocity for melody notes; the transcriber does not estimate
/// dynamics.
const PLAYBACK_VELOCITY: u8 = 127;

/// Owns the synthesizer, the transcriber, and the playhead.
pub struct AudioSession {
    engine: SynthEngine,
    transcriber: Transcriber,
    state: SessionState,

    /// Current playhead position in beats.
    playhead: f64,

    /// Wall-clock origin of the running session, if any.
    clock_origin: Option<Instant>,

    /// Playhead position when the running playback started.
    origin_beats: f64,

    /// Beat position reached by the previous update tick. None right after
    /// start, so notes sitting exactly at the origin still fire.
    last_tick_beats: Option<f64>,

    /// Recording offset in beats: where in the melody the take begins.
    offset: f64,

    /// Whether the metronome clicks during recording.
    pub metronome: bool,
}

impl AudioSession {
    pub fn new(engine: SynthEngine) -> Self {
        Self {
            engine,
            transcriber: Transcriber::new(),
            state: SessionState::Idle,
            playhead: 0.0,
            clock_origin: None,
            origin_beats: 0.0,
            last_tick_beats: None,
            offset: 0.0,
            metronome: true,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playback
    }

    /// Current playhead position in beats.
    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    /// Read access to the transcriber, e.g. for showing thresholds.
    pub fn transcriber(&self) -> &Transcriber {
        &self.transcriber
    }

    /// Access to the transcriber, e.g. for adjusting thresholds.
    pub fn transcriber_mut(&mut self) -> &mut Transcriber {
        &mut self.transcriber
    }

    /// Whether the engine can actually make sound.
    pub fn is_audible(&self) -> bool {
        self.engine.is_audible()
    }

    /// Moves the playhead. Only honored while idle; a running session owns
    /// its own clock.
    pub fn seek(&mut self, beats: f64) {
        if self.state == SessionState::Idle {
            self.playhead = beats.max(0.0);
        }
    }

    /// Begins a recording take reading from `source`.
    ///
    /// A running playback is stopped first; a running recording is left
    /// alone (starting twice does not restart the take).
    pub fn start_recording<S: SampleSource>(&mut self, source: S) {
        match self.state {
            SessionState::Playback => self.stop_playback(),
            SessionState::Recording => return,
            SessionState::Idle => {}
        }

        // New takes always start at the top of the melody. Recording from
        // the playhead instead would be `self.offset = self.playhead`.
        self.offset = 0.0;

        self.transcriber.start_sampling(source);
        self.clock_origin = Some(Instant::now());
        self.last_tick_beats = None;
        self.playhead = self.offset;
        self.state = SessionState::Recording;
        tracing::info!("recording started");
    }

    /// Ends the recording take, transcribes it, and merges the result into
    /// `melody`. Returns how many notes the take contributed. A no-op
    /// (returning 0) when no recording is running.
    pub fn stop_recording(&mut self, melody: &mut Melody) -> usize {
        if self.state != SessionState::Recording {
            return 0;
        }

        self.transcriber.stop_sampling();
        self.state = SessionState::Idle;
        self.clock_origin = None;
        self.last_tick_beats = None;

        let extracted = self.transcriber.extract_melody(melody.tempo, self.offset);
        let added = extracted.note_count();
        melody.join(extracted);
        self.transcriber.reset();

        tracing::info!(notes = added, "recording transcribed");
        added
    }

    /// Starts playback of `melody` from the playhead.
    ///
    /// A running recording is stopped (and transcribed into the melody)
    /// first. If the playhead is already at the very end, playback restarts
    /// from the beginning.
    pub fn start_playback(&mut self, melody: &mut Melody) {
        match self.state {
            SessionState::Playback => return,
            SessionState::Recording => {
                self.stop_recording(melody);
            }
            SessionState::Idle => {}
        }

        let end = melody.duration();
        if end <= 0.0 {
            return;
        }

        // If the user is already that close to the end, odds are they want
        // to hear it from the top
        let rewind_window = seconds_to_beats(REWIND_WINDOW_SECONDS, melody.tempo);
        if self.playhead >= end - rewind_window {
            self.playhead = 0.0;
        }

        self.engine.set_program(0);
        self.clock_origin = Some(Instant::now());
        self.origin_beats = self.playhead;
        self.last_tick_beats = None;
        self.state = SessionState::Playback;
        tracing::info!(from_beat = self.playhead, "playback started");
    }

    /// Stops playback immediately, silencing every voice. Idempotent; the
    /// playhead keeps its position for a later resume.
    pub fn stop_playback(&mut self) {
        if self.state != SessionState::Playback {
            return;
        }
        self.engine.all_notes_off(true);
        self.state = SessionState::Idle;
        self.clock_origin = None;
        self.last_tick_beats = None;
        tracing::info!("playback stopped");
    }

    /// Advances the running session. Called once per event-loop frame.
    ///
    /// During playback this fires the note-ons and note-offs the playhead
    /// crossed since the last frame and autostops (rewinding to the top)
    /// once the playhead passes the final note-off. During recording it
    /// drains the capture queue and drives the metronome.
    pub fn update(&mut self, melody: &Melody) {
        match self.state {
            SessionState::Idle => {}
            SessionState::Playback => self.update_playback(melody),
            SessionState::Recording => self.update_recording(melody),
        }
    }

    fn update_playback(&mut self, melody: &Melody) {
        let Some(origin) = self.clock_origin else {
            return;
        };
        let elapsed = origin.elapsed().as_secs_f64();
        let now = self.origin_beats + seconds_to_beats(elapsed, melody.tempo);

        for note in melody.notes() {
            // Note on: crossed in (last, now]; on the first frame, anything
            // sitting at or after the origin and already reached
            let should_on = match self.last_tick_beats {
                None => note.onset >= self.origin_beats && note.onset <= now,
                Some(last) => note.onset > last && note.onset <= now,
            };
            if should_on {
                self.engine.note_on(note.pitch, PLAYBACK_VELOCITY);
            }

            let end = note.end();
            let should_off = match self.last_tick_beats {
                None => end >= self.origin_beats && end <= now,
                Some(last) => end > last && end <= now,
            };
            if should_off {
                self.engine.note_off(note.pitch);
            }
        }

        self.playhead = now;
        self.last_tick_beats = Some(now);

        // Autostop at the end of the melody, then rewind to the top
        if now >= melody.duration() {
            self.stop_playback();
            self.playhead = 0.0;
        }
    }

    fn update_recording(&mut self, melody: &Melody) {
        self.transcriber.drain_pending();

        let Some(origin) = self.clock_origin else {
            return;
        };
        let elapsed = origin.elapsed().as_secs_f64();
        let now = self.offset + seconds_to_beats(elapsed, melody.tempo);

        if self.metronome {
            let last = self.last_tick_beats.unwrap_or(now);
            if now.floor() > last.floor() || self.last_tick_beats.is_none() {
                let beat_index = now.floor() as i64;
                self.engine.click(beat_index % 4 == 0);
            }
        }

        self.playhead = now;
        self.last_tick_beats = Some(now);
    }
}
