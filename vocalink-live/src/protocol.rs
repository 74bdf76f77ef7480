//! Live API wire messages.
//!
//! Client messages carry exactly one of `setup`, `realtimeInput` or
//! `clientContent`. Server messages are parsed permissively: every field is
//! optional and unknown fields are ignored.

use crate::audio::INPUT_MIME_TYPE;
use crate::config::{LiveConfig, ResponseModality};
use crate::error::{LiveError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Client messages ─────────────────────────────────────────────────────

/// Message sent from the client to the live service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input: Option<RealtimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_content: Option<ClientContent>,
}

impl ClientMessage {
    /// Session setup built from the connect configuration.
    pub fn setup(config: &LiveConfig) -> Self {
        let speech_config = config.voice.as_ref().map(|voice| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice.clone() },
            },
        });

        let system_instruction = config.system_instruction.as_ref().map(|text| Content {
            role: None,
            parts: vec![TextPart { text: text.clone() }],
        });

        let context_window_compression =
            config.context_compression.map(|c| ContextWindowCompression {
                trigger_tokens: c.trigger_tokens,
                sliding_window: SlidingWindow { target_tokens: c.target_tokens },
            });

        Self {
            setup: Some(Setup {
                model: config.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec![config.response_modality],
                    speech_config,
                },
                system_instruction,
                context_window_compression,
            }),
            ..Default::default()
        }
    }

    /// Realtime audio input (base64 PCM16 at 16kHz).
    pub fn audio(data: impl Into<String>) -> Self {
        Self {
            realtime_input: Some(RealtimeInput {
                audio: Some(Blob { data: data.into(), mime_type: INPUT_MIME_TYPE.to_string() }),
                audio_stream_end: None,
            }),
            ..Default::default()
        }
    }

    /// Signal that the audio input stream paused or ended.
    pub fn audio_stream_end() -> Self {
        Self {
            realtime_input: Some(RealtimeInput { audio: None, audio_stream_end: Some(true) }),
            ..Default::default()
        }
    }

    /// A complete user text turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            client_content: Some(ClientContent {
                turns: vec![Content {
                    role: Some("user".to_string()),
                    parts: vec![TextPart { text: text.into() }],
                }],
                turn_complete: true,
            }),
            ..Default::default()
        }
    }

    /// Serialize to the JSON text frame payload.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_compression: Option<ContextWindowCompression>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextWindowCompression {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_tokens: Option<u64>,
    pub sliding_window: SlidingWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlidingWindow {
    pub target_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

// ── Server messages ─────────────────────────────────────────────────────

/// Message received from the live service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_away: Option<GoAway>,
}

/// Characters of a rejected frame kept in the error message.
const RAW_EXCERPT_CHARS: usize = 200;

fn excerpt(raw: &str) -> String {
    match raw.char_indices().nth(RAW_EXCERPT_CHARS) {
        Some((end, _)) => format!("{}... ({} bytes)", &raw[..end], raw.len()),
        None => raw.to_string(),
    }
}

impl ServerMessage {
    /// Parse a text frame.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            LiveError::protocol(format!("Malformed server message: {}, raw: {}", e, excerpt(raw)))
        })
    }

    /// Handshake acknowledgement.
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Whether the message carries any model turn content.
    pub fn has_model_turn(&self) -> bool {
        self.server_content.as_ref().is_some_and(|c| c.model_turn.is_some())
    }

    /// Whether the model finished its turn.
    pub fn is_turn_complete(&self) -> bool {
        self.server_content.as_ref().and_then(|c| c.turn_complete).unwrap_or(false)
    }

    /// Whether the current turn was interrupted.
    pub fn is_interrupted(&self) -> bool {
        self.server_content.as_ref().and_then(|c| c.interrupted).unwrap_or(false)
    }

    /// Payloads of every inline-data part, in part order.
    ///
    /// A part with inline data but no `data` field yields `None`.
    pub fn audio_fragments(&self) -> impl Iterator<Item = Option<&str>> {
        self.model_parts()
            .filter_map(|part| part.inline_data.as_ref())
            .map(|blob| blob.data.as_deref())
    }

    /// Text of every text part, in part order.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.model_parts().filter_map(|part| part.text.as_deref())
    }

    fn model_parts(&self) -> impl Iterator<Item = &Part> {
        self.server_content
            .as_ref()
            .and_then(|c| c.model_turn.as_ref())
            .into_iter()
            .flat_map(|turn| turn.parts.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<ModelTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_complete: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Token counts reported by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<Vec<ModalityTokenCount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_tokens_details: Option<Vec<ModalityTokenCount>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModalityTokenCount {
    #[serde(default)]
    pub modality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
}

/// Notice that the server will close the connection soon.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<String>,
}
