use serde::Deserialize;

use crate::error::CallError;

/// Path probed for a user-supplied configuration file. Every field has a
/// working default, so the file is optional.
const CONFIG_PATH: &str = "santa_call.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Realtime bidi endpoint of the conversational service.
    pub endpoint: String,
    /// Environment variable holding the API key. The key itself never
    /// lives in a file.
    pub api_key_env: String,
    /// Model identifier sent in the setup payload.
    pub model: String,
    /// Synthesized voice selector.
    pub voice: String,
    /// ALSA capture device name (e.g. "default", "plughw:0,0").
    pub capture_device: String,
    /// ALSA playback device name.
    pub playback_device: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            voice: crate::persona::VOICE_NAME.to_string(),
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
        }
    }
}

impl Config {
    /// Load from `santa_call.toml` in the working directory when present,
    /// falling back to defaults (and to defaults entirely when the file is
    /// absent).
    pub fn load() -> Self {
        match std::fs::read_to_string(CONFIG_PATH) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Invalid {CONFIG_PATH}: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, CallError> {
        std::env::var(&self.api_key_env).map_err(|_| {
            CallError::Connection(format!("no API key in ${}", self.api_key_env))
        })
    }
}
