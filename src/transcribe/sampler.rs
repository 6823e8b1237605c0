//! Fixed-cadence sample acquisition.
//!
//! Capture runs on its own thread so audio-rate polling never contends with
//! UI-rate editing: the sampler polls the source every `1/sample_rate`
//! seconds and pushes through a bounded channel that the transcriber drains
//! on its own schedule (single writer, single reader).

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One pitch-tracker observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Detected fundamental frequency in Hz.
    pub frequency: f64,
    /// Normalized amplitude in 0..1.
    pub amplitude: f64,
}

/// A pollable source of (frequency, amplitude) observations.
///
/// The microphone/pitch-tracking stack is an external collaborator; anything
/// that can answer a poll can drive the transcriber, including the
/// deterministic sources below used by tests and the demo input.
pub trait SampleSource: Send + 'static {
    /// Returns the source's current observation. Called once per cadence
    /// tick from the sampler thread.
    fn sample(&mut self) -> Sample;
}

/// A source that replays a fixed sample sequence, then goes silent.
pub struct ScriptedSource {
    samples: Vec<Sample>,
    position: usize,
}

impl ScriptedSource {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }
}

impl SampleSource for ScriptedSource {
    fn sample(&mut self) -> Sample {
        let sample = self.samples.get(self.position).copied().unwrap_or(Sample {
            frequency: 0.0,
            amplitude: 0.0,
        });
        self.position += 1;
        sample
    }
}

/// Handle to a running sampler thread.
///
/// Dropping the handle without calling [`Sampler::stop`] cancels the thread
/// on its next tick; `stop` additionally joins it, guaranteeing no tick
/// fires after the call returns.
pub(crate) struct Sampler {
    cancel_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Sampler {
    /// Spawns the cadence thread.
    ///
    /// The first observation is taken one period after the spawn, matching
    /// a repeating timer's firing schedule. Samples are delivered through
    /// `out`; when the queue is full the newest observation is dropped
    /// rather than blocking the capture thread.
    pub(crate) fn spawn<S: SampleSource>(
        mut source: S,
        period: Duration,
        out: Sender<Sample>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);

        let handle = thread::spawn(move || {
            let mut next_tick = Instant::now() + period;
            loop {
                let wait = next_tick.saturating_duration_since(Instant::now());
                match cancel_rx.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let sample = source.sample();
                if out.try_send(sample).is_err() {
                    // Queue full: the reader has stalled; shed this tick.
                    tracing::warn!("sample queue full, dropping observation");
                }

                next_tick += period;
            }
        });

        Self { cancel_tx, handle }
    }

    /// Cancels the cadence and joins the thread.
    ///
    /// Synchronous: once this returns, no further sample can be delivered.
    pub(crate) fn stop(self) {
        let _ = self.cancel_tx.send(());
        let _ = self.handle.join();
    }
}

/// Creates the bounded sample queue shared between the sampler thread and
/// the transcriber. The capacity covers several seconds at the default
/// cadence; overflow means the reader has effectively stopped.
pub(crate) fn sample_queue() -> (Sender<Sample>, Receiver<Sample>) {
    bounded(1024)
}
