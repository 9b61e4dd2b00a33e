//! Narrow seams over the audio hardware so the call core runs unchanged
//! against fakes in tests.

use tokio::sync::mpsc;

use crate::error::CallError;
use crate::pcm::AudioFrame;

/// One block of captured microphone samples, mono f32 in [-1, 1].
pub type CaptureBlock = Vec<f32>;

/// Samples per capture block handed to the session.
pub const CAPTURE_BLOCK_SAMPLES: usize = 4096;

/// A push-driven microphone source. Implementations deliver fixed-size
/// blocks at the device's own cadence; there is no pollable iterator.
pub trait CaptureDevice: Send {
    /// Begin delivering capture blocks into `sink`. Fails with
    /// `DeviceUnavailable` when the microphone cannot be opened. Starting
    /// while already running is an error; `stop` first.
    fn start(&mut self, sink: mpsc::Sender<CaptureBlock>) -> Result<(), CallError>;

    /// Stop delivery and release the device. Calling twice is a no-op,
    /// never an error. Blocks already handed off may still be in flight.
    fn stop(&mut self);
}

/// An output device with its own clock, in seconds since the device was
/// opened. Frames are scheduled at absolute clock positions; the scheduler
/// above guarantees the positions never overlap.
pub trait PlaybackDevice: Send {
    /// Current device clock reading.
    fn now(&self) -> f64;

    /// Schedule `frame` to begin playing at `at` (device clock seconds).
    fn schedule(&mut self, frame: AudioFrame, at: f64) -> Result<(), CallError>;

    /// Stop accepting new frames and release the device. Audio already
    /// scheduled may finish playing after this returns. Idempotent.
    fn stop(&mut self);
}
