//! Audio format definitions and PCM/base64 helpers.
//!
//! The live service takes 16-bit little-endian mono PCM at 16kHz and answers
//! with the same encoding at 24kHz. Nothing here resamples; callers that capture
//! or play at other rates convert on their side.

use crate::error::{LiveError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Sample rate of audio sent to the service.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of audio produced by the service.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// MIME type attached to every realtime audio input message.
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Encode bytes as standard padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode standard padded base64.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| LiveError::protocol(format!("Invalid base64 payload: {}", e)))
}

/// PCM16 audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono).
    pub channels: u8,
    /// Bits per sample.
    pub bits_per_sample: u8,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16_24khz()
    }
}

impl AudioFormat {
    /// PCM16 mono at 24kHz (service output).
    pub fn pcm16_24khz() -> Self {
        Self { sample_rate: OUTPUT_SAMPLE_RATE, channels: 1, bits_per_sample: 16 }
    }

    /// PCM16 mono at 16kHz (service input).
    pub fn pcm16_16khz() -> Self {
        Self { sample_rate: INPUT_SAMPLE_RATE, channels: 1, bits_per_sample: 16 }
    }

    /// Calculate bytes per second for this format.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample / 8) as u32
    }

    /// Calculate duration in milliseconds for a given number of bytes.
    pub fn duration_ms(&self, bytes: usize) -> f64 {
        let bytes_per_ms = self.bytes_per_second() as f64 / 1000.0;
        bytes as f64 / bytes_per_ms
    }

    /// MIME type the service expects for this format.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Audio chunk with format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Raw audio data.
    pub data: Vec<u8>,
    /// Audio format of this chunk.
    pub format: AudioFormat,
}

impl AudioChunk {
    /// Create a new audio chunk.
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    /// Create a PCM16 16kHz chunk (microphone input format).
    pub fn pcm16_16khz(data: Vec<u8>) -> Self {
        Self::new(data, AudioFormat::pcm16_16khz())
    }

    /// Get duration of this audio chunk in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.format.duration_ms(self.data.len())
    }

    /// Encode audio data as base64.
    pub fn to_base64(&self) -> String {
        encode_base64(&self.data)
    }

    /// Decode audio data from base64.
    pub fn from_base64(encoded: &str, format: AudioFormat) -> Result<Self> {
        Ok(Self::new(decode_base64(encoded)?, format))
    }

    /// Create a chunk from i16 samples (PCM16 little-endian bytes).
    pub fn from_i16_samples(samples: &[i16], format: AudioFormat) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self::new(data, format)
    }

    /// Convert the audio data to i16 samples.
    ///
    /// Fails if the byte count is odd.
    pub fn to_i16_samples(&self) -> Result<Vec<i16>> {
        if self.data.len() % 2 != 0 {
            return Err(LiveError::audio(format!(
                "Invalid data length for PCM16: {} (must be even)",
                self.data.len()
            )));
        }
        Ok(self.data.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_from_base64_keeps_format() {
        let chunk = AudioChunk::from_base64("AQIDBA==", AudioFormat::pcm16_24khz()).unwrap();
        assert_eq!(chunk.data, vec![1, 2, 3, 4]);
        assert_eq!(chunk.format, AudioFormat::pcm16_24khz());
        assert_eq!(chunk.to_base64(), "AQIDBA==");
    }

    #[test]
    fn test_chunk_from_invalid_base64_fails() {
        let err = AudioChunk::from_base64("not base64!", AudioFormat::pcm16_16khz()).unwrap_err();
        assert!(matches!(err, LiveError::ProtocolError(_)));
    }

    #[test]
    fn test_audio_format_bytes_per_second() {
        assert_eq!(AudioFormat::pcm16_24khz().bytes_per_second(), 48000);
        assert_eq!(AudioFormat::pcm16_16khz().bytes_per_second(), 32000);
    }

    #[test]
    fn test_audio_format_duration() {
        let duration = AudioFormat::pcm16_16khz().duration_ms(32000);
        assert!((duration - 1000.0).abs() < 0.001);
    }

    #[test]
    fn test_mime_type_matches_input_constant() {
        assert_eq!(AudioFormat::pcm16_16khz().mime_type(), INPUT_MIME_TYPE);
        assert_eq!(AudioFormat::pcm16_24khz().mime_type(), "audio/pcm;rate=24000");
    }

    #[test]
    fn test_base64_known_values() {
        assert_eq!(decode_base64("AAA=").unwrap(), vec![0, 0]);
        assert_eq!(decode_base64("AQI=").unwrap(), vec![1, 2]);
        assert_eq!(encode_base64(&[]), "");
        assert!(decode_base64("").unwrap().is_empty());
    }

    #[test]
    fn test_base64_invalid_is_protocol_error() {
        let err = decode_base64("not base64!").unwrap_err();
        assert!(matches!(err, LiveError::ProtocolError(_)));
    }

    #[test]
    fn test_i16_samples_roundtrip() {
        let samples: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 1000, -1000];
        let chunk = AudioChunk::from_i16_samples(&samples, AudioFormat::pcm16_16khz());
        assert_eq!(chunk.data.len(), samples.len() * 2);
        assert_eq!(chunk.to_i16_samples().unwrap(), samples);
    }

    #[test]
    fn test_i16_samples_odd_bytes_error() {
        let chunk = AudioChunk::pcm16_16khz(vec![0, 1, 2]);
        assert!(matches!(chunk.to_i16_samples(), Err(LiveError::AudioFormatError(_))));
    }

    #[test]
    fn test_chunk_duration() {
        // 100ms of 16kHz mono PCM16 is 3200 bytes.
        let chunk = AudioChunk::pcm16_16khz(vec![0; 3200]);
        assert!((chunk.duration_ms() - 100.0).abs() < 0.001);
    }
}
