//! Run-length transcription of a sample buffer into notes.

use super::sampler::{sample_queue, Sample, SampleSource, Sampler};
use crate::melody::{midi_note_from_frequency, Melody, Note};
use crossbeam_channel::Receiver;
use std::time::Duration;
use thiserror::Error;

/// Invalid transcription settings, rejected at the boundary.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("amplitude threshold must be within 0..=1 (got {0})")]
    InvalidAmplitude(f64),

    #[error("minimum note duration must be positive (got {0})")]
    InvalidMinDuration(f64),

    #[error("pitch range {floor}..={ceiling} must lie within 0..=127 with floor <= ceiling")]
    InvalidPitchRange { floor: i32, ceiling: i32 },

    #[error("sample rate must be positive (got {0})")]
    InvalidSampleRate(f64),
}

/// Transcription parameters.
///
/// The defaults are tuned for an untrained singer at a conversational
/// distance from the microphone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscriberConfig {
    /// Minimum amplitude for a sample to count as voiced.
    pub threshold_amp: f64,

    /// Minimum note length in beats to keep after segmentation.
    pub threshold_dur: f64,

    /// Lowest pitch to keep (inclusive).
    pub threshold_note: i32,

    /// Highest pitch to keep (inclusive).
    pub ceiling_note: i32,

    /// Sampling cadence in observations per second.
    pub sample_rate: f64,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            threshold_amp: 0.2,
            threshold_dur: 0.06,
            threshold_note: 30,
            ceiling_note: 100,
            sample_rate: 32.0,
        }
    }
}

impl TranscriberConfig {
    /// Checks every field, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold_amp) || !self.threshold_amp.is_finite() {
            return Err(ConfigError::InvalidAmplitude(self.threshold_amp));
        }
        if self.threshold_dur <= 0.0 || !self.threshold_dur.is_finite() {
            return Err(ConfigError::InvalidMinDuration(self.threshold_dur));
        }
        if self.threshold_note < 0
            || self.ceiling_note > 127
            || self.threshold_note > self.ceiling_note
        {
            return Err(ConfigError::InvalidPitchRange {
                floor: self.threshold_note,
                ceiling: self.ceiling_note,
            });
        }
        if self.sample_rate <= 0.0 || !self.sample_rate.is_finite() {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        Ok(())
    }
}

/// A provisional note emitted by segmentation, before filtering.
/// Pitch is kept wide here because unmappable frequencies use a sentinel
/// outside the MIDI range.
struct Provisional {
    pitch: i32,
    onset: f64,
    duration: f64,
}

/// Buffers pitch-tracker observations and converts them into a melody.
///
/// One recording session is: `start_sampling`, sing, `stop_sampling`,
/// `extract_melody`, `reset`. Starting while already sampling restarts the
/// session (the buffer is cleared); stopping twice is a no-op.
pub struct Transcriber {
    config: TranscriberConfig,
    samples: Vec<Sample>,
    incoming: Option<Receiver<Sample>>,
    sampler: Option<Sampler>,
}

impl Transcriber {
    /// Creates a transcriber with default settings.
    pub fn new() -> Self {
        Self::with_config(TranscriberConfig::default())
    }

    /// Creates a transcriber with the given settings.
    /// Falls back to the defaults if the settings are invalid.
    pub fn with_config(config: TranscriberConfig) -> Self {
        let config = if config.validate().is_ok() {
            config
        } else {
            TranscriberConfig::default()
        };
        Self {
            config,
            samples: Vec::new(),
            incoming: None,
            sampler: None,
        }
    }

    /// Returns the active settings.
    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    /// Replaces the settings.
    ///
    /// Invalid settings are rejected and the prior value retained.
    pub fn set_config(&mut self, config: TranscriberConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Begins a sampling session reading from `source` at the configured
    /// cadence. Any previous session is stopped and its buffer discarded:
    /// starting over is a reset, not a queue.
    pub fn start_sampling<S: SampleSource>(&mut self, source: S) {
        self.stop_sampling();
        self.samples.clear();

        let (tx, rx) = sample_queue();
        let period = Duration::from_secs_f64(1.0 / self.config.sample_rate);
        self.incoming = Some(rx);
        self.sampler = Some(Sampler::spawn(source, period, tx));

        tracing::debug!(
            sample_rate = self.config.sample_rate,
            "started sampling session"
        );
    }

    /// Halts the cadence without discarding the buffer.
    ///
    /// Synchronous and idempotent: after the first call returns no further
    /// observation is accepted, and repeated calls do nothing.
    pub fn stop_sampling(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.stop();
            self.drain_pending();
            tracing::debug!(buffered = self.samples.len(), "stopped sampling session");
        }
    }

    /// Returns true while a sampling session is running.
    #[allow(dead_code)]
    pub fn is_sampling(&self) -> bool {
        self.sampler.is_some()
    }

    /// Clears the buffer and cancels any pending cadence.
    /// Safe to call at any time, including when not sampling.
    pub fn reset(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.stop();
        }
        self.incoming = None;
        self.samples.clear();
    }

    /// Moves any queued observations from the capture thread into the
    /// buffer. Called from the owning thread each frame and before
    /// extraction; this is the single-reader half of the queue discipline.
    pub fn drain_pending(&mut self) {
        if let Some(rx) = &self.incoming {
            self.samples.extend(rx.try_iter());
        }
    }

    /// Number of observations currently buffered.
    pub fn sample_count(&mut self) -> usize {
        self.drain_pending();
        self.samples.len()
    }

    /// Feeds observations directly, bypassing the sampler thread.
    /// Used by tests and by any caller that already owns a sample stream.
    #[allow(dead_code)]
    pub fn push_samples(&mut self, samples: impl IntoIterator<Item = Sample>) {
        self.samples.extend(samples);
    }

    /// Converts the buffered samples into a melody at the given tempo.
    ///
    /// The buffer is scanned once, in order, tracking the pitch of the last
    /// voiced sample and the length of the current streak of samples that
    /// continue it:
    ///
    /// - a voiced sample at the same pitch extends the streak;
    /// - a voiced sample at a different pitch closes the streak as a
    ///   provisional note and starts a new streak of one;
    /// - a quiet sample closes the streak and resets it to zero without
    ///   forgetting the pitch, so a brief dip in level splits a held note
    ///   rather than inventing a new pitch.
    ///
    /// Provisional notes shorter than `threshold_dur` or outside the
    /// configured pitch range are scrubbed out. `offset` shifts every onset,
    /// positioning an overdub at the playhead where the take began.
    ///
    /// An empty buffer yields an empty melody.
    pub fn extract_melody(&mut self, tempo: f64, offset: f64) -> Melody {
        self.drain_pending();

        if self.samples.is_empty() {
            return Melody::new(Vec::new(), tempo, None);
        }

        let beats_per_sample = (tempo / 60.0) / self.config.sample_rate;
        let mut preliminary: Vec<Provisional> = Vec::new();

        // Pitch of the last voiced sample, seeded from the first observation
        let mut current = midi_note_from_frequency(self.samples[0].frequency);
        // Consecutive samples continuing the current pitch
        let mut streak: usize = 0;

        let emit = |preliminary: &mut Vec<Provisional>, pitch: i32, start: usize, len: usize| {
            preliminary.push(Provisional {
                pitch,
                onset: offset + start as f64 * beats_per_sample,
                duration: len as f64 * beats_per_sample,
            });
        };

        for (index, sample) in self.samples.iter().enumerate() {
            if sample.amplitude >= self.config.threshold_amp {
                let note = midi_note_from_frequency(sample.frequency);

                if note == current {
                    // Continuation of the current note (or a new note at the
                    // same pitch as the last voiced sample)
                    streak += 1;
                } else {
                    // New pitch: close out the running streak first
                    if streak > 0 {
                        emit(&mut preliminary, current, index - streak, streak);
                    }
                    current = note;
                    streak = 1;
                }
            } else {
                // Below the amplitude floor: end of a note or more rest
                if streak > 0 {
                    emit(&mut preliminary, current, index - streak, streak);
                }
                streak = 0;
            }
        }

        if streak > 0 {
            emit(&mut preliminary, current, self.samples.len() - streak, streak);
        }

        let scrubbed = self.scrub_notes(preliminary);
        tracing::debug!(notes = scrubbed.len(), "extracted melody");

        Melody::new(scrubbed, tempo, None)
    }

    /// Drops provisional notes the singer did not likely sing: too short,
    /// or outside the configured pitch range.
    fn scrub_notes(&self, preliminary: Vec<Provisional>) -> Vec<Note> {
        preliminary
            .into_iter()
            .filter(|p| {
                p.duration >= self.config.threshold_dur
                    && p.pitch >= self.config.threshold_note
                    && p.pitch <= self.config.ceiling_note
            })
            .map(|p| Note::new(p.pitch as u8, p.onset, p.duration))
            .collect()
    }
}

impl Default for Transcriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Transcriber {
    fn drop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::ScriptedSource;
    use std::thread;

    fn voiced(frequency: f64) -> Sample {
        Sample {
            frequency,
            amplitude: 0.3,
        }
    }

    fn quiet(frequency: f64) -> Sample {
        Sample {
            frequency,
            amplitude: 0.05,
        }
    }

    #[test]
    fn test_empty_buffer_yields_empty_melody() {
        let mut t = Transcriber::new();
        let melody = t.extract_melody(120.0, 0.0);
        assert!(melody.is_empty());
        assert_eq!(melody.tempo, 120.0);
    }

    #[test]
    fn test_two_notes_split_by_quiet_gap() {
        // 8 voiced A4 samples, 4 quiet, 8 voiced: at 32 samples/sec and
        // 120 BPM each voiced run spans 8 * (2/32) = 0.5 beats.
        let mut t = Transcriber::new();
        t.push_samples(
            std::iter::repeat(voiced(440.0))
                .take(8)
                .chain(std::iter::repeat(quiet(440.0)).take(4))
                .chain(std::iter::repeat(voiced(440.0)).take(8)),
        );

        let melody = t.extract_melody(120.0, 0.0);
        let notes = melody.notes();
        assert_eq!(notes.len(), 2);

        assert_eq!(notes[0].pitch, 69);
        assert!((notes[0].onset - 0.0).abs() < 1e-9);
        assert!((notes[0].duration - 0.5).abs() < 1e-9);

        assert_eq!(notes[1].pitch, 69);
        assert!((notes[1].onset - 0.75).abs() < 1e-9);
        assert!((notes[1].duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_change_splits_streak() {
        // 4 samples of A4 then 4 of B4 with no gap
        let mut t = Transcriber::new();
        t.push_samples(
            std::iter::repeat(voiced(440.0))
                .take(4)
                .chain(std::iter::repeat(voiced(493.88)).take(4)),
        );

        let melody = t.extract_melody(120.0, 0.0);
        let notes = melody.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch, 69);
        assert_eq!(notes[1].pitch, 71);
        assert!((notes[1].onset - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_streak_is_flushed() {
        let mut t = Transcriber::new();
        t.push_samples(std::iter::repeat(voiced(440.0)).take(8));

        let melody = t.extract_melody(120.0, 0.0);
        assert_eq!(melody.note_count(), 1);
        assert!((melody.notes()[0].duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_short_fragments_are_scrubbed() {
        // A single voiced sample is 1/16 beat at 120 BPM / 32 Hz: kept only
        // if threshold_dur allows it. Default 0.06 keeps it (0.0625 >= 0.06);
        // a stricter threshold drops it.
        let mut t = Transcriber::new();
        let mut config = *t.config();
        config.threshold_dur = 0.1;
        t.set_config(config).unwrap();

        t.push_samples([voiced(440.0)]);
        assert!(t.extract_melody(120.0, 0.0).is_empty());
    }

    #[test]
    fn test_out_of_range_pitches_are_scrubbed() {
        // 27.5 Hz is A0 = MIDI 21, below the default floor of 30
        let mut t = Transcriber::new();
        t.push_samples(std::iter::repeat(voiced(27.5)).take(8));
        assert!(t.extract_melody(120.0, 0.0).is_empty());

        // 4186 Hz is C8 = MIDI 108, above the default ceiling of 100
        t.reset();
        t.push_samples(std::iter::repeat(voiced(4186.0)).take(8));
        assert!(t.extract_melody(120.0, 0.0).is_empty());
    }

    #[test]
    fn test_unmappable_frequency_never_panics() {
        let mut t = Transcriber::new();
        t.push_samples([voiced(0.0), voiced(-5.0), voiced(440.0)]);
        // The zero/negative frequencies map to the sentinel pitch and are
        // scrubbed by the range filter; the valid sample is too short alone
        let melody = t.extract_melody(120.0, 0.0);
        assert!(melody.notes().iter().all(|n| n.pitch == 69));
    }

    #[test]
    fn test_offset_shifts_onsets() {
        let mut t = Transcriber::new();
        t.push_samples(std::iter::repeat(voiced(440.0)).take(8));

        let melody = t.extract_melody(120.0, 4.0);
        assert!((melody.notes()[0].onset - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_filters_never_leak() {
        // Property: no emitted note is shorter than threshold_dur or outside
        // the pitch range, whatever the buffer contents.
        let mut t = Transcriber::new();
        let frequencies = [27.5, 440.0, 880.0, 4186.0, 0.0, 261.63];
        let mut buffer = Vec::new();
        for (i, &f) in frequencies.iter().cycle().take(200).enumerate() {
            buffer.push(Sample {
                frequency: f,
                amplitude: if i % 7 == 0 { 0.05 } else { 0.3 },
            });
        }
        t.push_samples(buffer);

        let config = *t.config();
        let melody = t.extract_melody(97.0, 0.0);
        for note in melody.notes() {
            assert!(note.duration >= config.threshold_dur);
            assert!((note.pitch as i32) >= config.threshold_note);
            assert!((note.pitch as i32) <= config.ceiling_note);
        }
    }

    #[test]
    fn test_invalid_config_rejected_prior_retained() {
        let mut t = Transcriber::new();
        let good = *t.config();

        let mut bad = good;
        bad.sample_rate = 0.0;
        assert_eq!(
            t.set_config(bad),
            Err(ConfigError::InvalidSampleRate(0.0))
        );
        assert_eq!(*t.config(), good);

        let mut bad = good;
        bad.threshold_dur = -1.0;
        assert!(t.set_config(bad).is_err());
        assert_eq!(*t.config(), good);

        let mut bad = good;
        bad.threshold_note = 90;
        bad.ceiling_note = 40;
        assert!(t.set_config(bad).is_err());
        assert_eq!(*t.config(), good);
    }

    #[test]
    fn test_sampling_lifecycle() {
        let mut t = Transcriber::new();
        let mut config = *t.config();
        config.sample_rate = 500.0; // Fast cadence to keep the test short
        t.set_config(config).unwrap();

        t.start_sampling(ScriptedSource::new(vec![voiced(440.0); 10_000]));
        assert!(t.is_sampling());
        thread::sleep(std::time::Duration::from_millis(50));

        t.stop_sampling();
        assert!(!t.is_sampling());
        let collected = t.sample_count();
        assert!(collected > 0);

        // Idempotent: a second stop changes nothing
        t.stop_sampling();
        assert_eq!(t.sample_count(), collected);

        t.reset();
        assert_eq!(t.sample_count(), 0);
    }

    #[test]
    fn test_restart_clears_buffer() {
        let mut t = Transcriber::new();
        t.push_samples(std::iter::repeat(voiced(440.0)).take(8));

        let mut config = *t.config();
        config.sample_rate = 500.0;
        t.set_config(config).unwrap();

        // Starting a session is a reset, not a queue
        t.start_sampling(ScriptedSource::new(Vec::new()));
        t.stop_sampling();
        let melody = t.extract_melody(120.0, 0.0);
        assert!(melody.is_empty());
    }
}
