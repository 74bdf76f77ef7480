//! Reading input recordings and writing reply audio.

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use vocalink_live::audio::INPUT_SAMPLE_RATE;
use vocalink_live::{AssembledTurn, AudioChunk, AudioFormat};

/// Load 16kHz mono PCM16 samples from a WAV file or a raw `.pcm` file.
pub fn read_input(path: &Path) -> Result<Vec<i16>> {
    let is_raw = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pcm"));
    if is_raw {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let chunk = AudioChunk::pcm16_16khz(bytes);
        return Ok(chunk.to_i16_samples()?);
    }

    let reader =
        WavReader::open(path).with_context(|| format!("opening WAV {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.sample_rate != INPUT_SAMPLE_RATE
        || spec.bits_per_sample != 16
        || spec.sample_format != SampleFormat::Int
    {
        bail!(
            "{} is {} Hz, {} channel(s), {}-bit; expected 16000 Hz mono 16-bit PCM",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample
        );
    }

    reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("decoding samples from {}", path.display()))
}

/// Split samples into chunks of `chunk_ms` milliseconds at 16kHz.
pub fn chunk_samples(samples: &[i16], chunk_ms: u32) -> Vec<AudioChunk> {
    let per_chunk = ((INPUT_SAMPLE_RATE as u64 * chunk_ms as u64) / 1000).max(1) as usize;
    samples
        .chunks(per_chunk)
        .map(|chunk| AudioChunk::from_i16_samples(chunk, AudioFormat::pcm16_16khz()))
        .collect()
}

/// Write a completed turn as a WAV file in the turn's own format.
pub fn write_turn(path: &Path, turn: &AssembledTurn) -> Result<()> {
    let spec = WavSpec {
        channels: turn.format.channels as u16,
        sample_rate: turn.format.sample_rate,
        bits_per_sample: turn.format.bits_per_sample as u16,
        sample_format: SampleFormat::Int,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for pair in turn.audio.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
    }
    writer.finalize().with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}
