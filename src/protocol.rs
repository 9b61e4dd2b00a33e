//! Wire messages for the bidirectional realtime stream.
//!
//! The remote service speaks camelCase JSON: one setup message up front,
//! then realtime-input messages carrying one PCM chunk each and tool
//! responses going up; model-turn audio parts, tool-call lists, and
//! transcriptions coming down.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pcm::WireChunk;

// ======================== Outbound ========================

/// Everything the client ever sends. Externally tagged, so each message
/// serializes as a single-key object like `{"realtimeInput": {...}}`.
#[derive(Debug, Serialize)]
pub enum ClientMessage {
    #[serde(rename = "setup")]
    Setup(Setup),
    #[serde(rename = "realtimeInput")]
    RealtimeInput(RealtimeInput),
    #[serde(rename = "toolResponse")]
    ToolResponse(ToolResponse),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

impl Setup {
    /// The fixed session configuration: persona script, tool schema, voice.
    pub fn for_caller(model: &str, voice: &str, caller_name: &str) -> Self {
        Self {
            model: model.to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![TextPart {
                    text: crate::persona::system_instruction(caller_name),
                }],
            },
            tools: vec![serde_json::json!({
                "functionDeclarations": [crate::wishlist::tool_declaration()]
            })],
        }
    }
}

/// One captured microphone block on its way up.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<WireChunk>,
}

/// Acknowledgement for one or more tool invocations, keyed by invocation id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

// ======================== Inbound ========================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
    pub turn_complete: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModelTurn {
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub inline_data: Option<InlineData>,
    pub text: Option<String>,
}

/// An audio payload part: base64 PCM bytes plus the format tag.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Transcription {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

/// A named request from the peer. Consumed once; generates exactly one
/// acknowledgement correlated by `id`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl Default for FunctionCall {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            args: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn realtime_input_serializes_with_wire_names() {
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![WireChunk {
                mime_type: "audio/pcm;rate=16000".into(),
                data: "AAAA".into(),
            }],
        });
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({
                "realtimeInput": {
                    "mediaChunks": [
                        { "mimeType": "audio/pcm;rate=16000", "data": "AAAA" }
                    ]
                }
            })
        );
    }

    #[test]
    fn setup_carries_persona_tools_and_voice() {
        let setup = Setup::for_caller("models/santa-live", "Puck", "Marcos");
        let v = serde_json::to_value(ClientMessage::Setup(setup)).unwrap();
        let s = &v["setup"];
        assert_eq!(s["model"], "models/santa-live");
        assert_eq!(s["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            s["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
        assert_eq!(
            s["tools"][0]["functionDeclarations"][0]["name"],
            "update_wishlist"
        );
        assert!(
            s["systemInstruction"]["parts"][0]["text"]
                .as_str()
                .unwrap()
                .contains("Marcos")
        );
    }

    #[test]
    fn parses_a_tool_call_message() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "toolCall": {
                "functionCalls": [
                    { "id": "abc", "name": "update_wishlist", "args": { "shoeSize": "42" } }
                ]
            }
        }))
        .unwrap();
        let calls = msg.tool_call.unwrap().function_calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "abc");
        assert_eq!(calls[0].args["shoeSize"], "42");
    }

    #[test]
    fn parses_a_model_turn_audio_part() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAAA" } }
                    ]
                }
            }
        }))
        .unwrap();
        let parts = msg.server_content.unwrap().model_turn.unwrap().parts;
        assert_eq!(
            parts[0].inline_data.as_ref().unwrap().mime_type.as_deref(),
            Some("audio/pcm;rate=24000")
        );
    }

    #[test]
    fn unknown_server_fields_do_not_break_parsing() {
        let msg: ServerMessage =
            serde_json::from_value(json!({ "usageMetadata": { "tokens": 12 } })).unwrap();
        assert!(msg.server_content.is_none());
        assert!(msg.tool_call.is_none());
    }
}
