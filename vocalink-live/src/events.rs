//! Session-level events surfaced to callers.

use crate::assembler::AssembledTurn;
use crate::protocol::ServerMessage;
use crate::usage::UsageRecord;
use serde::{Deserialize, Serialize};

/// What the remote side is doing, as far as the client can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerStatus {
    /// No connection.
    #[default]
    Disconnected,
    /// Ready for user input.
    Listening,
    /// Model turn is streaming.
    Responding,
    /// Model turn finished and its audio was handed off.
    ResponseReady,
}

impl ServerStatus {
    /// Status implied by a single message, if any.
    ///
    /// Turn completion wins over model content arriving in the same message.
    pub fn from_message(message: &ServerMessage) -> Option<Self> {
        if message.is_setup_complete() || message.is_interrupted() {
            Some(Self::Listening)
        } else if message.is_turn_complete() {
            Some(Self::ResponseReady)
        } else if message.has_model_turn() {
            Some(Self::Responding)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Listening => write!(f, "listening"),
            Self::Responding => write!(f, "responding"),
            Self::ResponseReady => write!(f, "response_ready"),
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseReason {
    /// WebSocket close code, when the peer sent one.
    pub code: Option<u16>,
    /// Close reason text.
    pub reason: String,
    /// `true` when `disconnect` ended the connection.
    pub initiated_locally: bool,
}

impl CloseReason {
    pub(crate) fn local() -> Self {
        Self { code: None, reason: "client disconnect".to_string(), initiated_locally: true }
    }

    pub(crate) fn remote(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into(), initiated_locally: false }
    }
}

/// Every handler callback, as a value.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// A parsed server message.
    Message(Box<ServerMessage>),
    /// Server status changed.
    Status(ServerStatus),
    /// Usage report.
    Usage(UsageRecord),
    /// A model turn completed.
    TurnComplete(AssembledTurn),
    /// The in-progress turn was discarded.
    Interrupted {
        /// Bytes dropped from the turn buffer.
        discarded_bytes: usize,
    },
    /// Transport or protocol error.
    Error(String),
    /// The connection ended.
    Closed(CloseReason),
}
