//! Callback surface for live sessions.

use crate::assembler::AssembledTurn;
use crate::error::LiveError;
use crate::events::{CloseReason, LiveEvent, ServerStatus};
use crate::protocol::ServerMessage;
use crate::usage::UsageRecord;
use tokio::sync::mpsc;

/// Receives everything a session observes on its connection.
///
/// Callbacks run on the session's dispatch task, one at a time and in arrival
/// order. They must not block; hand heavy work (playback, file IO) to another
/// task.
pub trait LiveHandler: Send + Sync {
    /// Called for every parsed server message.
    fn on_message(&self, _message: &ServerMessage) {}

    /// Called when the server status changes.
    fn on_status(&self, _status: ServerStatus) {}

    /// Called for every usage report.
    fn on_usage(&self, _usage: &UsageRecord) {}

    /// Called once per completed model turn with its audio.
    fn on_turn_complete(&self, _turn: AssembledTurn) {}

    /// Called when the in-progress turn is discarded.
    fn on_interrupted(&self, _discarded_bytes: usize) {}

    /// Called on transport or protocol errors.
    fn on_error(&self, _error: &LiveError) {}

    /// Called once when a connection ends.
    fn on_close(&self, _reason: &CloseReason) {}
}

/// Handler that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl LiveHandler for NoopHandler {}

/// Forwards callbacks as [`LiveEvent`]s into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<LiveEvent>,
}

impl ChannelHandler {
    /// Create a handler and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LiveEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: LiveEvent) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl LiveHandler for ChannelHandler {
    fn on_message(&self, message: &ServerMessage) {
        self.forward(LiveEvent::Message(Box::new(message.clone())));
    }

    fn on_status(&self, status: ServerStatus) {
        self.forward(LiveEvent::Status(status));
    }

    fn on_usage(&self, usage: &UsageRecord) {
        self.forward(LiveEvent::Usage(*usage));
    }

    fn on_turn_complete(&self, turn: AssembledTurn) {
        self.forward(LiveEvent::TurnComplete(turn));
    }

    fn on_interrupted(&self, discarded_bytes: usize) {
        self.forward(LiveEvent::Interrupted { discarded_bytes });
    }

    fn on_error(&self, error: &LiveError) {
        self.forward(LiveEvent::Error(error.to_string()));
    }

    fn on_close(&self, reason: &CloseReason) {
        self.forward(LiveEvent::Closed(reason.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_handler_forwards_in_order() {
        let (handler, mut rx) = ChannelHandler::new();
        handler.on_status(ServerStatus::Listening);
        handler.on_interrupted(8);
        handler.on_error(&LiveError::protocol("bad frame"));

        assert!(matches!(rx.try_recv().unwrap(), LiveEvent::Status(ServerStatus::Listening)));
        assert!(matches!(rx.try_recv().unwrap(), LiveEvent::Interrupted { discarded_bytes: 8 }));
        match rx.try_recv().unwrap() {
            LiveEvent::Error(msg) => assert!(msg.contains("bad frame")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_handler_survives_dropped_receiver() {
        let (handler, rx) = ChannelHandler::new();
        drop(rx);
        handler.on_status(ServerStatus::Disconnected);
    }
}
