//! # vocalink-live
//!
//! Client for the Gemini Live bidirectional speech API.
//!
//! A [`LiveSession`] holds one WebSocket connection, streams microphone audio
//! up as realtime input and turns the model's streamed audio fragments back
//! into one playable buffer per completed turn.
//!
//! ## Architecture
//!
//! ```text
//!   caller ── send_audio ──▶ LiveSession ── realtimeInput ──▶ Live service
//!                                 │
//!                                 │ dispatch task (one per connection)
//!                                 ▼
//!                 ServerMessage ─▶ TurnAssembler ─▶ LiveHandler callbacks
//!                                 (fragments, interrupt,   (turn audio, status,
//!                                  turn complete)           usage, errors, close)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vocalink_live::{ChannelHandler, LiveConfig, LiveEvent, LiveSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LiveConfig::builder(api_key)
//!         .voice("Puck")
//!         .instruction("You are a friendly tutor.")
//!         .compression_target(16_000)
//!         .build()?;
//!
//!     let (handler, mut events) = ChannelHandler::new();
//!     let session = LiveSession::new(config, Arc::new(handler));
//!     session.connect().await?;
//!     session.send_audio(&microphone_chunk_base64).await;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             LiveEvent::TurnComplete(turn) => play(&turn.audio),
//!             LiveEvent::Usage(usage) => println!("tokens: {}", usage.total()),
//!             LiveEvent::Closed(_) => break,
//!             _ => {}
//!         }
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod assembler;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod protocol;
pub mod session;
pub mod usage;

// Re-exports
pub use assembler::{AssembledTurn, TurnAssembler, TurnState};
pub use audio::{AudioChunk, AudioFormat};
pub use config::{ContextCompression, LiveConfig, LiveConfigBuilder, ResponseModality};
pub use error::{LiveError, Result};
pub use events::{CloseReason, LiveEvent, ServerStatus};
pub use handler::{ChannelHandler, LiveHandler, NoopHandler};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{LiveSession, SessionState};
pub use usage::{ModalityTokens, UsageRecord};
