use thiserror::Error;

use crate::pcm::DecodeError;

/// Failures surfaced to the caller as human-readable status strings.
/// None of these crash the process; a terminal failure simply ends the call.
#[derive(Debug, Error)]
pub enum CallError {
    /// No microphone/speaker, or the device refused to open.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Remote handshake or transport failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Malformed inbound audio payload. The offending frame is dropped;
    /// the session itself stays open.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A second connect was attempted without an intervening disconnect.
    #[error("a call is already active; hang up first")]
    SessionActive,
}
