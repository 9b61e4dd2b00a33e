//! Playback scheduling.
//!
//! [`PlaybackScheduler`] keeps the running "next available start time"
//! cursor that makes consecutive frames play back-to-back with no gap and
//! no overlap, whatever the arrival timing. Enqueued frames are also laid
//! on the level monitor's timeline at their scheduled start, so `level()`
//! reflects what is audible at the device clock, not what was queued last.
//! [`AlsaPlayback`] is the real output device behind it: a writer thread
//! that holds frames until their scheduled position on the device clock,
//! then writes them to ALSA.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::alsa;
use super::device::PlaybackDevice;
use super::level::LevelMonitor;
use crate::error::CallError;
use crate::pcm::{AudioFrame, PLAYBACK_SAMPLE_RATE};

/// Schedules decoded frames for strictly sequential, gapless playback in
/// arrival order. Arrival order is assumed to equal intended playback
/// order: the peer is the sole producer of a single stream.
pub struct PlaybackScheduler {
    device: Box<dyn PlaybackDevice>,
    next_start: f64,
    monitor: LevelMonitor,
}

impl PlaybackScheduler {
    pub fn new(device: Box<dyn PlaybackDevice>) -> Self {
        Self {
            device,
            next_start: 0.0,
            monitor: LevelMonitor::new(),
        }
    }

    /// Schedule `frame` at `max(now, cursor)` and advance the cursor past
    /// its end. Frames arriving faster than real time stack up seamlessly;
    /// frames arriving late start immediately.
    pub fn enqueue(&mut self, frame: AudioFrame) -> Result<(), CallError> {
        let start = self.device.now().max(self.next_start);
        self.next_start = start + frame.duration();
        self.monitor
            .push_at(start, frame.samples(), frame.sample_rate());
        self.device.schedule(frame, start)
    }

    /// Activity level of the audio playing right now on the device clock.
    pub fn level(&mut self) -> f32 {
        let now = self.device.now();
        self.monitor.level_at(now)
    }

    /// Cursor position: where the next frame would start at the earliest.
    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    /// Release the device and reset the cursor and monitor. Audio already
    /// scheduled may finish playing; that latency tail is accepted, not
    /// cancelled.
    pub fn shutdown(&mut self) {
        self.device.stop();
        self.next_start = 0.0;
        self.monitor.reset();
    }
}

// ======================== ALSA output device ========================

pub struct AlsaPlayback {
    epoch: Instant,
    queue: Option<mpsc::Sender<(f64, AudioFrame)>>,
    stopped: Arc<AtomicBool>,
}

impl AlsaPlayback {
    /// Open the output device and start the writer thread. The device
    /// clock starts at zero here.
    pub fn open(device: &str) -> Result<Self, CallError> {
        let epoch = Instant::now();
        let (tx, rx) = mpsc::channel::<(f64, AudioFrame)>(64);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), CallError>>();
        let device = device.to_string();

        thread::Builder::new()
            .name("audio-play".into())
            .spawn(move || play_thread(&device, epoch, rx, ready_tx))
            .map_err(|e| CallError::DeviceUnavailable(format!("playback thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                epoch,
                queue: Some(tx),
                stopped: Arc::new(AtomicBool::new(false)),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CallError::DeviceUnavailable(
                "playback thread exited before opening the device".into(),
            )),
        }
    }
}

impl PlaybackDevice for AlsaPlayback {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, frame: AudioFrame, at: f64) -> Result<(), CallError> {
        let Some(queue) = &self.queue else {
            return Err(CallError::DeviceUnavailable("playback stopped".into()));
        };
        // The session task must stay non-blocking; a full queue means the
        // writer is hopelessly behind, so the frame is dropped.
        if queue.try_send((at, frame)).is_err() {
            log::warn!("Playback queue full, dropping frame");
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender lets the writer drain what is already
        // scheduled and exit on its own; we do not join it here.
        self.queue.take();
        log::info!("Playback stopped");
    }
}

impl Drop for AlsaPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

fn play_thread(
    device: &str,
    epoch: Instant,
    mut rx: mpsc::Receiver<(f64, AudioFrame)>,
    ready_tx: std::sync::mpsc::Sender<Result<(), CallError>>,
) {
    let (pcm, params) = match alsa::open_playback(device, PLAYBACK_SAMPLE_RATE) {
        Ok(ok) => {
            let _ = ready_tx.send(Ok(()));
            ok
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let io = match pcm.io_i16() {
        Ok(io) => io,
        Err(e) => {
            log::error!("Playback I/O setup failed: {e}");
            return;
        }
    };

    log::info!("Playback started: rate={}", params.sample_rate);

    while let Some((at, frame)) = rx.blocking_recv() {
        // Hold the frame until its slot on the device clock. Consecutive
        // frames have contiguous slots, so the writes append seamlessly;
        // a genuine gap in arrival becomes silence, as it should.
        let now = epoch.elapsed().as_secs_f64();
        if at > now {
            thread::sleep(Duration::from_secs_f64(at - now));
        }

        let pcm_data: Vec<i16> = frame
            .samples()
            .iter()
            .map(|&s| (s * 32768.0) as i16)
            .collect();

        let mut written = 0;
        let mut retries = 0u32;
        while written < pcm_data.len() {
            match io.writei(&pcm_data[written..]) {
                Ok(n) => {
                    written += n;
                    retries = 0;
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {e}, recovering...");
                    retries += 1;
                    if let Err(e2) = pcm.prepare() {
                        log::error!("Failed to recover PCM playback: {e2}");
                        return;
                    }
                    if retries >= 3 {
                        log::error!(
                            "Max recovery retries reached, dropping {} unwritten samples",
                            pcm_data.len() - written
                        );
                        break;
                    }
                }
            }
        }
    }

    // Sender dropped: flush what ALSA still buffers, then release.
    let _ = pcm.drain();
    log::info!("Playback thread exiting");
}
