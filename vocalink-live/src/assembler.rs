//! Turn assembly: inbound audio fragments in, one playable buffer per turn out.
//!
//! ```text
//!            fragment                 turn complete (emit)
//!   Idle ───────────────▶ Accumulating ─────────────────────▶ Idle
//!                             │
//!                             └──── interrupted (discard) ──▶ Idle
//! ```
//!
//! Fragments are appended in arrival order and never reordered. The assembler
//! does no format conversion; emitted audio keeps the service's 24kHz PCM16.

use crate::audio::{AudioFormat, decode_base64, encode_base64};
use crate::error::Result;
use bytes::{Bytes, BytesMut};

/// Assembly state for the current model turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No turn in progress.
    #[default]
    Idle,
    /// At least one fragment of the current turn has arrived.
    Accumulating,
}

/// The audio of one completed model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTurn {
    /// Concatenated PCM16 bytes in arrival order.
    pub audio: Bytes,
    /// Number of fragments the turn was built from, empty ones included.
    pub fragment_count: usize,
    /// Format of `audio`.
    pub format: AudioFormat,
}

impl AssembledTurn {
    /// Base64 form handed to playback.
    pub fn to_base64(&self) -> String {
        encode_base64(&self.audio)
    }

    /// Playback length in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.format.duration_ms(self.audio.len())
    }

    /// Whether the turn carried no audio bytes.
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

/// Accumulates the fragments of the in-progress turn.
#[derive(Debug, Default)]
pub struct TurnAssembler {
    state: TurnState,
    chunks: Vec<Bytes>,
    buffered: usize,
    fragments: usize,
    format: AudioFormat,
}

impl TurnAssembler {
    /// Create an idle assembler for 24kHz output audio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an idle assembler that tags emitted turns with `format`.
    pub fn with_format(format: AudioFormat) -> Self {
        Self { format, ..Self::default() }
    }

    /// Current state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Bytes buffered for the in-progress turn.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    /// Fragments received for the in-progress turn.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Append one fragment payload.
    ///
    /// A missing payload counts as a fragment of zero bytes. A payload that is
    /// not valid base64 also contributes nothing and is reported as a
    /// `ProtocolError`; the turn stays open either way.
    pub fn push_fragment(&mut self, payload: Option<&str>) -> Result<()> {
        self.state = TurnState::Accumulating;
        self.fragments += 1;

        let Some(encoded) = payload else {
            return Ok(());
        };
        let decoded = decode_base64(encoded)?;
        if !decoded.is_empty() {
            self.buffered += decoded.len();
            self.chunks.push(Bytes::from(decoded));
        }
        Ok(())
    }

    /// Close the turn and emit its audio.
    ///
    /// Returns `None` when no fragment arrived since the last emission,
    /// interruption or reset.
    pub fn complete(&mut self) -> Option<AssembledTurn> {
        if self.state == TurnState::Idle {
            return None;
        }

        let mut audio = BytesMut::with_capacity(self.buffered);
        for chunk in self.chunks.drain(..) {
            audio.extend_from_slice(&chunk);
        }
        let turn = AssembledTurn {
            audio: audio.freeze(),
            fragment_count: self.fragments,
            format: self.format,
        };
        self.clear();
        Some(turn)
    }

    /// Drop the in-progress turn without emitting. Returns the discarded byte count.
    pub fn interrupt(&mut self) -> usize {
        let discarded = self.buffered;
        self.clear();
        discarded
    }

    /// Return to `Idle` unconditionally.
    pub fn reset(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.chunks.clear();
        self.buffered = 0;
        self.fragments = 0;
        self.state = TurnState::Idle;
    }
}
