mod cli;
mod telemetry;
mod wav;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::Cli;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use vocalink_live::{AudioChunk, ChannelHandler, LiveError, LiveEvent, LiveSession, ServerStatus};

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads GOOGLE_API_KEY.
    dotenvy::dotenv().ok();
    telemetry::init();

    let cli = Cli::parse();
    let config = cli.live_config(cli.resolve_api_key()?)?;

    let samples = wav::read_input(&cli.input)?;
    let chunks = wav::chunk_samples(&samples, cli.chunk_ms);
    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("creating {}", cli.output_dir.display()))?;
    info!(
        input = %cli.input.display(),
        samples = samples.len(),
        chunks = chunks.len(),
        "Loaded input audio"
    );

    let (handler, mut events) = ChannelHandler::new();
    let session = LiveSession::new(config, Arc::new(handler));
    session.connect().await.context("connecting to the live service")?;

    let outcome = async {
        stream_input(&session, &chunks, cli.chunk_ms).await?;
        await_reply(&mut events, &cli.output_dir, Duration::from_secs(cli.wait_secs)).await
    }
    .await;

    session.disconnect().await;
    let totals = session.usage_totals();
    info!(
        input_text = totals.input.text_tokens,
        input_audio = totals.input.audio_tokens,
        output_text = totals.output.text_tokens,
        output_audio = totals.output.audio_tokens,
        total = totals.total(),
        "Session usage"
    );

    if let Some(path) = outcome? {
        println!("{}", path.display());
    }
    Ok(())
}

/// Send the input at roughly real-time pace, then mark the end of the stream.
async fn stream_input(session: &LiveSession, chunks: &[AudioChunk], chunk_ms: u32) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(chunk_ms as u64));
    for chunk in chunks {
        ticker.tick().await;
        if !session.send_audio_chunk(chunk).await {
            return Err(LiveError::NotConnected).context("streaming input audio");
        }
    }
    session.end_audio_stream().await;
    debug!(chunks = chunks.len(), "Input audio sent");
    Ok(())
}

/// Wait for the first completed turn and save its audio.
///
/// Returns `None` when the wait elapses or the turn carried no audio.
async fn await_reply(
    events: &mut UnboundedReceiver<LiveEvent>,
    output_dir: &Path,
    wait: Duration,
) -> Result<Option<PathBuf>> {
    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);

    loop {
        let event = tokio::select! {
            _ = &mut deadline => {
                warn!(wait_secs = wait.as_secs(), "No completed turn before the wait elapsed");
                return Ok(None);
            }
            event = events.recv() => event,
        };

        match event {
            Some(LiveEvent::TurnComplete(turn)) if turn.is_empty() => {
                info!(fragments = turn.fragment_count, "Reply carried no audio");
                return Ok(None);
            }
            Some(LiveEvent::TurnComplete(turn)) => {
                let path = output_dir.join("turn-1.wav");
                wav::write_turn(&path, &turn)?;
                info!(
                    path = %path.display(),
                    bytes = turn.audio.len(),
                    duration_ms = turn.duration_ms(),
                    "Saved reply"
                );
                return Ok(Some(path));
            }
            // Text-only turns complete without audio.
            Some(LiveEvent::Status(ServerStatus::ResponseReady)) => return Ok(None),
            Some(LiveEvent::Status(status)) => debug!(%status, "Server status"),
            Some(LiveEvent::Message(message)) => {
                for text in message.text_parts() {
                    println!("{}", text);
                }
            }
            Some(LiveEvent::Interrupted { discarded_bytes }) => {
                warn!(discarded_bytes, "Reply interrupted, waiting for the next turn");
            }
            Some(LiveEvent::Usage(usage)) => debug!(tokens = usage.total(), "Usage report"),
            Some(LiveEvent::Error(error)) => warn!(%error, "Session error"),
            Some(LiveEvent::Closed(reason)) => {
                bail!("connection closed before a reply: {:?} {}", reason.code, reason.reason)
            }
            None => bail!("event channel closed"),
        }
    }
}
