//! Microphone capture pipeline.
//!
//! A dedicated OS thread (NOT a tokio task, to avoid contention with the
//! async network side) reads S16LE periods from ALSA, accumulates exactly
//! [`CAPTURE_BLOCK_SAMPLES`] mono samples, converts to f32 and pushes the
//! block to the session. Real-time audio cannot queue indefinitely: when
//! nobody is consuming, blocks are dropped, never buffered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use super::alsa;
use super::device::{CAPTURE_BLOCK_SAMPLES, CaptureBlock, CaptureDevice};
use crate::error::CallError;
use crate::pcm::CAPTURE_SAMPLE_RATE;

pub struct AlsaCapture {
    device: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AlsaCapture {
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl CaptureDevice for AlsaCapture {
    fn start(&mut self, sink: mpsc::Sender<CaptureBlock>) -> Result<(), CallError> {
        if self.handle.is_some() {
            // A silent Ok here would discard the new sink.
            return Err(CallError::DeviceUnavailable(
                "capture already running; stop it before starting again".into(),
            ));
        }
        self.running.store(true, Ordering::SeqCst);

        // The PCM handle is opened on the capture thread itself; a readiness
        // channel reports whether the device came up so `start` can fail
        // with DeviceUnavailable synchronously.
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), CallError>>();
        let device = self.device.clone();
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || capture_thread(&device, sink, &running, ready_tx))
            .map_err(|e| CallError::DeviceUnavailable(format!("capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(CallError::DeviceUnavailable(
                    "capture thread exited before opening the device".into(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return; // already stopped
        }
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        log::info!("Capture stopped");
    }
}

impl Drop for AlsaCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_thread(
    device: &str,
    sink: mpsc::Sender<CaptureBlock>,
    running: &AtomicBool,
    ready_tx: std::sync::mpsc::Sender<Result<(), CallError>>,
) {
    let (pcm, params) = match alsa::open_capture(device, CAPTURE_SAMPLE_RATE) {
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
            log::error!("Capture I/O setup failed: {e}");
            return;
        }
    };

    let period_size = params.period_size;
    let mut read_buf = vec![0i16; period_size];
    // Accumulate until a whole block is ready, then hand it off.
    let mut accum: Vec<i16> = Vec::with_capacity(CAPTURE_BLOCK_SAMPLES * 2);

    log::info!(
        "Capture started: rate={}, period={}, block={}",
        params.sample_rate,
        period_size,
        CAPTURE_BLOCK_SAMPLES,
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(frames) => {
                accum.extend_from_slice(&read_buf[..frames]);
                while accum.len() >= CAPTURE_BLOCK_SAMPLES {
                    let block: CaptureBlock = accum[..CAPTURE_BLOCK_SAMPLES]
                        .iter()
                        .map(|&s| s as f32 / 32768.0)
                        .collect();
                    accum.drain(..CAPTURE_BLOCK_SAMPLES);
                    if sink.blocking_send(block).is_err() {
                        // Session gone; nothing left to feed.
                        log::warn!("Capture sink dropped, stopping delivery");
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("ALSA capture error: {e}, recovering...");
                if let Err(e2) = pcm.prepare() {
                    log::error!("Failed to recover PCM capture: {e2}");
                    break;
                }
            }
        }
    }

    log::info!("Capture thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_while_running_is_rejected() {
        let mut capture = AlsaCapture::new("default");
        // Simulate a live capture without touching hardware.
        capture.running.store(true, Ordering::SeqCst);
        capture.handle = Some(thread::spawn(|| {}));

        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            capture.start(tx),
            Err(CallError::DeviceUnavailable(_))
        ));

        capture.stop();
        assert!(capture.handle.is_none());
    }
}
