//! audio - Capture, playback scheduling, and output level monitoring.
//!
//! ALSA handles the hardware on dedicated OS threads; everything above the
//! [`device`] traits is plain logic that tests drive with fakes.

mod alsa;
mod capture;
pub mod device;
mod level;
mod playback;

pub use capture::AlsaCapture;
pub use device::{CAPTURE_BLOCK_SAMPLES, CaptureBlock, CaptureDevice, PlaybackDevice};
pub use playback::{AlsaPlayback, PlaybackScheduler};
