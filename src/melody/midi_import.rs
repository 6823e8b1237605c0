//! Standard MIDI File (SMF) import.
//!
//! Reads a .mid/.midi file into a single melody line. All channels are
//! merged: the notepad edits one voice, so whatever the file contains is
//! flattened into one beat-ordered note list.
//!
//! # Limitations
//!
//! - Only note on/off events become notes; velocity is discarded
//! - The first tempo meta event sets the melody tempo
//! - SMPTE-timed and Format 2 files are rejected

use super::{Melody, Note};
use midly::{Format, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during MIDI import.
#[derive(Debug, Error)]
pub enum MidiImportError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// MIDI parsing failed.
    #[error("MIDI parse error: {0}")]
    Parse(String),

    /// Unsupported MIDI format or timing.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// State for tracking open notes during import.
/// Key is (channel, pitch), value is the onset tick.
type ActiveNotes = HashMap<(u8, u8), u32>;

/// Imports a MIDI file as a melody.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed, or uses SMPTE
/// timing or the sequential track format.
pub fn import_melody_from_midi<P: AsRef<Path>>(path: P) -> Result<Melody, MidiImportError> {
    let path = path.as_ref();
    let data = fs::read(path)?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported MIDI")
        .to_string();

    import_melody_from_bytes(&data, name)
}

/// Imports a melody from in-memory SMF bytes.
pub fn import_melody_from_bytes(data: &[u8], name: String) -> Result<Melody, MidiImportError> {
    let smf = Smf::parse(data).map_err(|e| MidiImportError::Parse(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u32,
        Timing::Timecode(_, _) => {
            return Err(MidiImportError::UnsupportedFormat(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };

    if smf.header.format == Format::Sequential {
        return Err(MidiImportError::UnsupportedFormat(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut tempo: f64 = 120.0;
    let mut tempo_seen = false;
    let mut notes: Vec<Note> = Vec::new();

    for track in smf.tracks.iter() {
        let mut active: ActiveNotes = HashMap::new();
        let mut current_tick: u32 = 0;

        for event in track {
            current_tick += event.delta.as_int();

            match event.kind {
                TrackEventKind::Meta(midly::MetaMessage::Tempo(usec_per_beat)) => {
                    let usec = usec_per_beat.as_int();
                    if usec > 0 && !tempo_seen {
                        tempo = 60_000_000.0 / usec as f64;
                        tempo_seen = true;
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        midly::MidiMessage::NoteOn { key, vel } => {
                            let pitch = key.as_int();
                            if vel.as_int() > 0 {
                                active.insert((ch, pitch), current_tick);
                            } else {
                                // Note on with velocity 0 = note off
                                close_note(&mut notes, &mut active, ch, pitch, current_tick, ticks_per_beat);
                            }
                        }
                        midly::MidiMessage::NoteOff { key, vel: _ } => {
                            close_note(&mut notes, &mut active, ch, key.as_int(), current_tick, ticks_per_beat);
                        }
                        _ => {} // Other channel messages carry no melody data
                    }
                }
                _ => {} // Ignore SysEx and remaining meta events
            }
        }

        // Close any notes the file left hanging, giving them one beat
        for ((_, pitch), start_tick) in active {
            notes.push(Note::new(
                pitch,
                start_tick as f64 / ticks_per_beat as f64,
                1.0,
            ));
        }
    }

    let mut melody = Melody::new(Vec::new(), tempo, Some(name));
    melody.join(Melody::new(notes, tempo, None)); // Settle into onset order

    Ok(melody)
}

/// Finishes an open note at `end_tick` and appends it in beat units.
fn close_note(
    notes: &mut Vec<Note>,
    active: &mut ActiveNotes,
    channel: u8,
    pitch: u8,
    end_tick: u32,
    ticks_per_beat: u32,
) {
    if let Some(start_tick) = active.remove(&(channel, pitch)) {
        let duration_ticks = end_tick.saturating_sub(start_tick).max(1);
        notes.push(Note::new(
            pitch,
            start_tick as f64 / ticks_per_beat as f64,
            duration_ticks as f64 / ticks_per_beat as f64,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{
        num::{u15, u24, u28, u4, u7},
        Header, MetaMessage, MidiMessage, TrackEvent,
    };

    /// Builds a one-track SMF in memory: tempo 120, C4 for one beat at
    /// beat 1, then E4 for half a beat.
    fn sample_smf_bytes() -> Vec<u8> {
        let header = Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480)));
        let mut track = Vec::new();

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
        });
        track.push(TrackEvent {
            delta: u28::new(480),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(100),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(480),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(60),
                    vel: u7::new(0),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(64),
                    vel: u7::new(100),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(240),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(64),
                    vel: u7::new(0),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header,
            tracks: vec![track],
        };
        let mut bytes = Vec::new();
        smf.write(&mut bytes).expect("in-memory SMF write");
        bytes
    }

    #[test]
    fn test_import_single_track() {
        let bytes = sample_smf_bytes();
        let melody = import_melody_from_bytes(&bytes, "test".to_string()).unwrap();

        assert_eq!(melody.name, "test");
        assert!((melody.tempo - 120.0).abs() < 1e-6);
        assert_eq!(melody.note_count(), 2);

        let notes = melody.notes();
        assert_eq!(notes[0].pitch, 60);
        assert!((notes[0].onset - 1.0).abs() < 1e-9);
        assert!((notes[0].duration - 1.0).abs() < 1e-9);
        assert_eq!(notes[1].pitch, 64);
        assert!((notes[1].onset - 2.0).abs() < 1e-9);
        assert!((notes[1].duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(
            import_melody_from_bytes(b"not a midi file", "x".to_string()),
            Err(MidiImportError::Parse(_))
        ));
    }
}
