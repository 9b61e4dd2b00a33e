//! PCM codec: float samples ↔ 16-bit little-endian wire payloads.
//!
//! The remote service exchanges raw PCM16 as base64 text tagged with a
//! MIME-style format string. Encoding and decoding are pure transforms;
//! all session/device state lives elsewhere.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Microphone capture rate expected by the service (Hz, mono).
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
/// Rate of synthesized speech coming back from the service (Hz, mono).
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload of {0} bytes is not a whole number of 16-bit samples")]
    OddByteCount(usize),
}

/// A decoded block of mono audio. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frame duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Transport representation of one audio block: base64 bytes plus a
/// MIME-style tag naming format and sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChunk {
    pub mime_type: String,
    pub data: String,
}

/// Quantize float samples in [-1, 1] to i16, pack little-endian, base64.
pub fn encode_frame(samples: &[f32]) -> WireChunk {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        let v = (s * 32768.0) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    WireChunk {
        mime_type: format!("audio/pcm;rate={CAPTURE_SAMPLE_RATE}"),
        data: B64.encode(&bytes),
    }
}

/// Reverse of [`encode_frame`]: base64 text back to i16 samples.
pub fn decode_chunk(payload: &str) -> Result<Vec<i16>, DecodeError> {
    let bytes = B64.decode(payload)?;
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddByteCount(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Map i16 samples back into a float frame in [-1, 1].
pub fn to_float_frame(samples: &[i16], sample_rate: u32) -> AudioFrame {
    AudioFrame::new(
        samples.iter().map(|&s| s as f32 / 32768.0).collect(),
        sample_rate,
    )
}

/// Pull the `rate=` parameter out of a tag like `audio/pcm;rate=24000`.
pub fn rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .find_map(|p| p.trim().strip_prefix("rate="))
        .and_then(|r| r.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_matches_quantization() {
        let samples = vec![0.0, 0.5, -0.5, 0.999, -1.0, 0.123_456];
        let chunk = encode_frame(&samples);
        let decoded = decode_chunk(&chunk.data).unwrap();
        assert_eq!(decoded.len(), samples.len());
        let frame = to_float_frame(&decoded, CAPTURE_SAMPLE_RATE);
        for (orig, got) in samples.iter().zip(frame.samples()) {
            assert!((orig - got).abs() <= 1.0 / 32768.0, "{orig} vs {got}");
        }
    }

    #[test]
    fn encode_then_decode_is_byte_identical() {
        let samples = vec![0.25f32; 64];
        let chunk = encode_frame(&samples);
        let decoded = decode_chunk(&chunk.data).unwrap();
        let again = encode_frame(to_float_frame(&decoded, CAPTURE_SAMPLE_RATE).samples());
        assert_eq!(chunk.data, again.data);
    }

    #[test]
    fn mime_tag_names_the_capture_rate() {
        let chunk = encode_frame(&[0.0]);
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        assert_eq!(rate_from_mime(&chunk.mime_type), Some(16_000));
        assert_eq!(rate_from_mime("audio/pcm"), None);
    }

    #[test]
    fn odd_byte_count_is_rejected() {
        // 3 raw bytes cannot form whole 16-bit samples
        let payload = B64.encode([1u8, 2, 3]);
        match decode_chunk(&payload) {
            Err(DecodeError::OddByteCount(3)) => {}
            other => panic!("expected OddByteCount, got {other:?}"),
        }
    }

    #[test]
    fn malformed_base64_is_rejected() {
        assert!(matches!(
            decode_chunk("not base64!!"),
            Err(DecodeError::Base64(_))
        ));
    }

    #[test]
    fn frame_duration_follows_sample_rate() {
        let frame = AudioFrame::new(vec![0.0; 12_000], PLAYBACK_SAMPLE_RATE);
        assert!((frame.duration() - 0.5).abs() < 1e-9);
    }
}
