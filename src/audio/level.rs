//! Output level monitor for UI animation.
//!
//! Frames arrive faster than real time during a speech turn, so the monitor
//! records samples on the device timeline and reads them back at the device
//! clock position: only audio that is audible *right now* contributes.
//! Each poll derives a 0..1-ish activity level from the lower half of the
//! frequency bins — where the voice fundamentals live. The value is not
//! hard-clamped here; consumers clamp if they need to.

use std::collections::VecDeque;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Analysis window, kept small for snappy visual response.
pub const FFT_SIZE: usize = 128;

/// Empirical divisor mapping the 0..255 mean bin magnitude into ~[0, 1].
const LEVEL_DIVISOR: f32 = 140.0;

/// One scheduled run of samples on the device timeline.
struct Segment {
    start: f64,
    rate: f64,
    samples: Vec<f32>,
}

impl Segment {
    fn end(&self) -> f64 {
        self.start + self.samples.len() as f64 / self.rate
    }
}

pub struct LevelMonitor {
    segments: VecDeque<Segment>,
    planner: FftPlanner<f32>,
}

impl LevelMonitor {
    pub fn new() -> Self {
        Self {
            segments: VecDeque::new(),
            planner: FftPlanner::new(),
        }
    }

    /// Record samples scheduled to begin playing at `start` (device clock
    /// seconds). Segments must be pushed in start order; the scheduler's
    /// cursor guarantees that.
    pub fn push_at(&mut self, start: f64, samples: &[f32], sample_rate: u32) {
        if samples.is_empty() {
            return;
        }
        self.segments.push_back(Segment {
            start,
            rate: sample_rate as f64,
            samples: samples.to_vec(),
        });
    }

    /// Activity level of the audio audible at device time `now`: mean
    /// magnitude across the lower half of the frequency bins over the newest
    /// [`FFT_SIZE`] already-played samples, scaled to a byte range and
    /// normalized by the fixed divisor. Audio queued ahead of `now` does not
    /// count until it plays; audio older than one window reads as silence.
    pub fn level_at(&mut self, now: f64) -> f32 {
        // Segments that fell out of every possible window are done for good.
        while let Some(front) = self.segments.front() {
            if front.end() + FFT_SIZE as f64 / front.rate < now {
                self.segments.pop_front();
            } else {
                break;
            }
        }

        // Collect newest-first, then restore chronological order.
        let mut window: Vec<f32> = Vec::with_capacity(FFT_SIZE);
        for seg in self.segments.iter().rev() {
            if seg.start > now {
                continue; // still queued
            }
            let played = (((now - seg.start) * seg.rate) as usize + 1).min(seg.samples.len());
            let horizon = now - FFT_SIZE as f64 / seg.rate;
            let first_live = if horizon <= seg.start {
                0
            } else {
                ((horizon - seg.start) * seg.rate).ceil() as usize
            };
            if first_live >= played {
                continue; // fully before the window
            }
            let take = (FFT_SIZE - window.len()).min(played - first_live);
            window.extend(seg.samples[played - take..played].iter().rev());
            if window.len() == FFT_SIZE {
                break;
            }
        }
        if window.is_empty() {
            return 0.0;
        }
        window.reverse();

        let fft = self.planner.plan_fft_forward(FFT_SIZE);
        let mut buf: Vec<Complex<f32>> = window
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(FFT_SIZE)
            .collect();
        fft.process(&mut buf);

        // frequencyBinCount is FFT_SIZE / 2; average only its lower half.
        let relevant_bins = FFT_SIZE / 4;
        let mut sum = 0.0f32;
        for bin in buf.iter().take(relevant_bins) {
            let amplitude = bin.norm() * 2.0 / FFT_SIZE as f32;
            sum += amplitude * 255.0;
        }
        (sum / relevant_bins as f32) / LEVEL_DIVISOR
    }

    /// Drop the retained timeline, reporting silence until new samples land.
    pub fn reset(&mut self) {
        self.segments.clear();
    }
}

impl Default for LevelMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 24_000;

    fn tone(gain: f32) -> Vec<f32> {
        (0..FFT_SIZE)
            .map(|i| gain * (i as f32 * 0.3).sin())
            .collect()
    }

    /// Device time at which a segment starting at `start` has fully played.
    fn end_of(start: f64, len: usize) -> f64 {
        start + len as f64 / RATE as f64
    }

    #[test]
    fn silence_reports_zero() {
        let mut monitor = LevelMonitor::new();
        assert_eq!(monitor.level_at(0.0), 0.0);
        monitor.push_at(0.0, &vec![0.0; FFT_SIZE], RATE);
        assert!(monitor.level_at(end_of(0.0, FFT_SIZE)) < 1e-6);
    }

    #[test]
    fn louder_signal_reports_higher_level() {
        let mut quiet_monitor = LevelMonitor::new();
        quiet_monitor.push_at(0.0, &tone(0.2), RATE);
        let quiet = quiet_monitor.level_at(end_of(0.0, FFT_SIZE));

        let mut loud_monitor = LevelMonitor::new();
        loud_monitor.push_at(0.0, &tone(0.9), RATE);
        let loud = loud_monitor.level_at(end_of(0.0, FFT_SIZE));

        assert!(quiet > 0.0);
        assert!(loud > quiet);
    }

    #[test]
    fn queued_audio_is_silent_until_it_plays() {
        let mut monitor = LevelMonitor::new();
        monitor.push_at(5.0, &tone(0.9), RATE);
        // The segment sits in the queue; the clock has not reached it.
        assert_eq!(monitor.level_at(1.0), 0.0);
        assert!(monitor.level_at(end_of(5.0, FFT_SIZE)) > 0.0);
    }

    #[test]
    fn drained_audio_decays_to_silence() {
        let mut monitor = LevelMonitor::new();
        monitor.push_at(0.0, &tone(0.9), RATE);
        assert!(monitor.level_at(end_of(0.0, FFT_SIZE)) > 0.0);
        // Long after the last sample played, the output is silent again.
        assert_eq!(monitor.level_at(10.0), 0.0);
    }

    #[test]
    fn reading_mid_segment_uses_only_played_samples() {
        let mut monitor = LevelMonitor::new();
        // Loud first half, silent second half, in one segment.
        let mut samples = tone(0.9);
        samples.extend(std::iter::repeat_n(0.0, FFT_SIZE));
        monitor.push_at(0.0, &samples, RATE);
        let mid = monitor.level_at(end_of(0.0, FFT_SIZE / 2));
        let late = monitor.level_at(end_of(0.0, 2 * FFT_SIZE));
        assert!(mid > 0.0);
        assert!(late < mid);
    }

    #[test]
    fn reset_returns_to_silence() {
        let mut monitor = LevelMonitor::new();
        monitor.push_at(0.0, &tone(0.5), RATE);
        assert!(monitor.level_at(end_of(0.0, FFT_SIZE)) > 0.0);
        monitor.reset();
        assert_eq!(monitor.level_at(end_of(0.0, FFT_SIZE)), 0.0);
    }
}
