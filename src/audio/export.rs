//! Audio export.
//!
//! Renders a melody offline through the synthesizer and writes the result
//! to a WAV file. Uses its own synthesizer instance so a running playback
//! session is unaffected.

use super::engine::SAMPLE_RATE;
use crate::melody::{beats_to_seconds, Melody};
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Buffer size for rendering chunks.
/// Larger buffers are more efficient but use more memory.
const RENDER_BUFFER_SIZE: usize = 4096;

/// Seconds of tail rendered past the final note-off so releases ring out.
const RELEASE_TAIL_SECONDS: f64 = 2.0;

/// Velocity for rendered notes, matching live playback.
const RENDER_VELOCITY: i32 = 127;

/// A note boundary scheduled at an absolute sample position.
struct RenderEvent {
    sample_pos: usize,
    pitch: u8,
    note_on: bool,
}

/// Exports a melody to a WAV file.
///
/// Renders the whole melody through a fresh synthesizer at 44.1 kHz stereo,
/// 16-bit, plus a short tail for the final release.
///
/// # Errors
///
/// Returns error if the SoundFont cannot be loaded, the output file cannot
/// be created, or rendering fails.
pub fn export_melody_to_wav<P1, P2>(
    melody: &Melody,
    soundfont_path: P1,
    output_path: P2,
) -> Result<()>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    let mut sf_file = BufReader::new(File::open(soundfont_path.as_ref()).with_context(|| {
        format!(
            "Failed to open SoundFont for export: {}",
            soundfont_path.as_ref().display()
        )
    })?);
    let soundfont = Arc::new(
        SoundFont::new(&mut sf_file)
            .map_err(|e| anyhow::anyhow!("Failed to load SoundFont: {:?}", e))?,
    );

    let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
    let mut synth = Synthesizer::new(&soundfont, &settings)
        .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;

    let duration_seconds = melody.duration_seconds() + RELEASE_TAIL_SECONDS;
    let total_samples = (duration_seconds * SAMPLE_RATE as f64) as usize;

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(output_path.as_ref(), spec).with_context(|| {
        format!(
            "Failed to create output WAV file: {}",
            output_path.as_ref().display()
        )
    })?;

    let mut events = collect_events(melody);
    // Offs sort before ons at the same instant so retriggers restart cleanly
    events.sort_by(|a, b| {
        a.sample_pos
            .cmp(&b.sample_pos)
            .then(a.note_on.cmp(&b.note_on))
    });

    let mut left = vec![0.0f32; RENDER_BUFFER_SIZE];
    let mut right = vec![0.0f32; RENDER_BUFFER_SIZE];
    let mut rendered: usize = 0;
    let mut next_event = 0;

    while rendered < total_samples {
        let chunk = RENDER_BUFFER_SIZE.min(total_samples - rendered);

        // Dispatch every event that lands in this chunk
        while next_event < events.len() && events[next_event].sample_pos < rendered + chunk {
            let event = &events[next_event];
            if event.note_on {
                synth.note_on(0, event.pitch as i32, RENDER_VELOCITY);
            } else {
                synth.note_off(0, event.pitch as i32);
            }
            next_event += 1;
        }

        synth.render(&mut left[..chunk], &mut right[..chunk]);

        for i in 0..chunk {
            writer.write_sample(to_i16(left[i]))?;
            writer.write_sample(to_i16(right[i]))?;
        }

        rendered += chunk;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    tracing::info!(
        path = %output_path.as_ref().display(),
        seconds = duration_seconds,
        "melody exported to WAV"
    );
    Ok(())
}

/// Converts the melody's notes into sample-positioned render events.
fn collect_events(melody: &Melody) -> Vec<RenderEvent> {
    let mut events = Vec::with_capacity(melody.note_count() * 2);
    for note in melody.notes() {
        events.push(RenderEvent {
            sample_pos: beat_to_sample(note.onset, melody.tempo),
            pitch: note.pitch,
            note_on: true,
        });
        events.push(RenderEvent {
            sample_pos: beat_to_sample(note.end(), melody.tempo),
            pitch: note.pitch,
            note_on: false,
        });
    }
    events
}

/// Maps a beat position to an absolute sample index at the export rate.
fn beat_to_sample(beats: f64, tempo: f64) -> usize {
    (beats_to_seconds(beats.max(0.0), tempo) * SAMPLE_RATE as f64) as usize
}

/// Clamps and scales a float sample to 16-bit PCM.
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
