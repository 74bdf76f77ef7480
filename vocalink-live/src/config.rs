//! Configuration types for live sessions.

use crate::error::{LiveError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Live API WebSocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default native-audio dialog model.
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-preview-native-audio-dialog";

/// Prebuilt voices known to the live service.
pub const GEMINI_VOICES: &[&str] = &[
    "Puck", "Charon", "Kore", "Fenrir", "Aoede", "Leda", "Orus", "Zephyr",
];

/// Modality the model answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    /// Spoken PCM audio (default).
    #[default]
    Audio,
    /// Text parts only.
    Text,
}

impl std::fmt::Display for ResponseModality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for ResponseModality {
    type Err = LiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "text" => Ok(Self::Text),
            other => Err(LiveError::config(format!("unknown response modality '{}'", other))),
        }
    }
}

/// Sliding-window context compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextCompression {
    /// Context size that triggers compression; the service default when `None`.
    pub trigger_tokens: Option<u64>,
    /// Context size to compress down to.
    pub target_tokens: u64,
}

impl ContextCompression {
    /// Compress down to `target_tokens` using the service's trigger.
    pub fn sliding_window(target_tokens: u64) -> Self {
        Self { trigger_tokens: None, target_tokens }
    }

    /// Set the trigger size.
    pub fn with_trigger(mut self, trigger_tokens: u64) -> Self {
        self.trigger_tokens = Some(trigger_tokens);
        self
    }
}

/// Configuration passed to `LiveSession::new`.
pub struct LiveConfig {
    /// Capability key, sent as the `key` query parameter.
    pub api_key: SecretString,
    /// Model identifier sent in the setup message.
    pub model: String,
    /// Requested response modality.
    pub response_modality: ResponseModality,
    /// System instruction text.
    pub system_instruction: Option<String>,
    /// Prebuilt voice name.
    pub voice: Option<String>,
    /// Context-window compression target.
    pub context_compression: Option<ContextCompression>,
    /// WebSocket endpoint, without the key.
    pub endpoint: String,
    /// Upper bound on the handshake. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Reset the in-progress turn whenever audio is sent.
    pub clear_turn_on_send: bool,
}

impl Clone for LiveConfig {
    fn clone(&self) -> Self {
        Self {
            api_key: SecretString::from(self.api_key.expose_secret().to_owned()),
            model: self.model.clone(),
            response_modality: self.response_modality,
            system_instruction: self.system_instruction.clone(),
            voice: self.voice.clone(),
            context_compression: self.context_compression,
            endpoint: self.endpoint.clone(),
            connect_timeout: self.connect_timeout,
            clear_turn_on_send: self.clear_turn_on_send,
        }
    }
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("response_modality", &self.response_modality)
            .field("system_instruction", &self.system_instruction)
            .field("voice", &self.voice)
            .field("context_compression", &self.context_compression)
            .field("endpoint", &self.endpoint)
            .field("connect_timeout", &self.connect_timeout)
            .field("clear_turn_on_send", &self.clear_turn_on_send)
            .finish()
    }
}

impl LiveConfig {
    /// Create a configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            response_modality: ResponseModality::default(),
            system_instruction: None,
            voice: None,
            context_compression: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: None,
            clear_turn_on_send: true,
        }
    }

    /// Create a builder for LiveConfig.
    pub fn builder(api_key: impl Into<String>) -> LiveConfigBuilder {
        LiveConfigBuilder::new(api_key)
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the response modality.
    pub fn with_response_modality(mut self, modality: ResponseModality) -> Self {
        self.response_modality = modality;
        self
    }

    /// Set the system instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Set the voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Set context-window compression.
    pub fn with_context_compression(mut self, compression: ContextCompression) -> Self {
        self.context_compression = Some(compression);
        self
    }

    /// Point the session at another endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Bound the handshake.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Keep the in-progress turn when audio is sent.
    pub fn keep_turn_on_send(mut self) -> Self {
        self.clear_turn_on_send = false;
        self
    }

    /// Check the configuration before connecting.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(LiveError::config("api key must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(LiveError::config("model must not be empty"));
        }
        if let Some(compression) = &self.context_compression {
            if compression.target_tokens == 0 {
                return Err(LiveError::config("compression target must be positive"));
            }
            if compression.trigger_tokens.is_some_and(|t| t < compression.target_tokens) {
                return Err(LiveError::config(
                    "compression trigger must not be below the target",
                ));
            }
        }
        if let Some(voice) = &self.voice {
            if !GEMINI_VOICES.contains(&voice.as_str()) {
                tracing::warn!(%voice, "Voice is not in the known voice list, passing through");
            }
        }
        self.parse_endpoint().map(|_| ())
    }

    /// Endpoint with the capability key attached.
    pub fn connection_url(&self) -> Result<String> {
        let mut url = self.parse_endpoint()?;
        url.query_pairs_mut().append_pair("key", self.api_key.expose_secret());
        Ok(url.into())
    }

    fn parse_endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| LiveError::config(format!("invalid endpoint '{}': {}", self.endpoint, e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(LiveError::config(format!(
                "endpoint scheme must be ws or wss, got '{}'",
                other
            ))),
        }
    }
}

/// Builder for LiveConfig.
#[derive(Debug, Clone)]
pub struct LiveConfigBuilder {
    config: LiveConfig,
}

impl LiveConfigBuilder {
    /// Create a new builder.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { config: LiveConfig::new(api_key) }
    }

    /// Set the model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the response modality.
    pub fn response_modality(mut self, modality: ResponseModality) -> Self {
        self.config.response_modality = modality;
        self
    }

    /// Set the system instruction.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = Some(instruction.into());
        self
    }

    /// Set the voice.
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.config.voice = Some(voice.into());
        self
    }

    /// Compress the context window down to `target_tokens`.
    pub fn compression_target(mut self, target_tokens: u64) -> Self {
        let trigger = self.config.context_compression.and_then(|c| c.trigger_tokens);
        self.config.context_compression =
            Some(ContextCompression { trigger_tokens: trigger, target_tokens });
        self
    }

    /// Set the endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<LiveConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
