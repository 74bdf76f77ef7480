use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use vocalink_live::config::DEFAULT_MODEL;
use vocalink_live::{ContextCompression, LiveConfig, ResponseModality};

#[derive(Parser, Debug)]
#[command(name = "vocalink")]
#[command(version, about = "Stream a recording to a live speech session and save the spoken reply", long_about = None)]
pub struct Cli {
    /// Input audio: WAV (16kHz mono 16-bit) or raw little-endian PCM16 `.pcm`
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the reply WAV files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Prebuilt voice name
    #[arg(long)]
    pub voice: Option<String>,

    /// System instruction
    #[arg(long)]
    pub instruction: Option<String>,

    /// Model identifier
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Response modality (audio or text)
    #[arg(long, default_value = "audio")]
    pub modality: ResponseModality,

    /// Length of each streamed audio chunk in milliseconds
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(10..=5000))]
    pub chunk_ms: u32,

    /// Sliding-window compression target in tokens
    #[arg(long)]
    pub compression_target: Option<u64>,

    /// Context size that triggers compression
    #[arg(long, requires = "compression_target")]
    pub compression_trigger: Option<u64>,

    /// Seconds to wait for the reply after the input is sent
    #[arg(long, default_value_t = 30)]
    pub wait_secs: u64,

    /// Override the service endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Connect timeout in seconds
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,

    /// API key; falls back to GEMINI_API_KEY
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Cli {
    /// Key from the flag or environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .context("no API key: pass --api-key or set GOOGLE_API_KEY / GEMINI_API_KEY")
    }

    /// Session configuration for this invocation.
    pub fn live_config(&self, api_key: String) -> Result<LiveConfig> {
        // One recording is one interaction; later chunks must not drop an early reply.
        let mut config = LiveConfig::new(api_key)
            .with_model(self.model.clone())
            .with_response_modality(self.modality)
            .keep_turn_on_send();
        if let Some(voice) = &self.voice {
            config = config.with_voice(voice.clone());
        }
        if let Some(instruction) = &self.instruction {
            config = config.with_instruction(instruction.clone());
        }
        if let Some(target) = self.compression_target {
            let mut compression = ContextCompression::sliding_window(target);
            if let Some(trigger) = self.compression_trigger {
                compression = compression.with_trigger(trigger);
            }
            config = config.with_context_compression(compression);
        }
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        if let Some(secs) = self.connect_timeout_secs {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        config.validate().context("invalid session configuration")?;
        Ok(config)
    }
}
