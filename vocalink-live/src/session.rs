//! Live session lifecycle and inbound dispatch.
//!
//! A [`LiveSession`] owns at most one WebSocket connection at a time. Inbound
//! frames are read by a single dispatch task per connection, which is the only
//! writer of turn state besides the send-side reset.

use crate::assembler::TurnAssembler;
use crate::audio::AudioChunk;
use crate::config::LiveConfig;
use crate::error::{LiveError, Result};
use crate::events::{CloseReason, ServerStatus};
use crate::handler::LiveHandler;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::usage::UsageRecord;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{Instrument, debug, error, info, warn};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// One open connection.
struct Link {
    sink: Arc<tokio::sync::Mutex<WsSink>>,
    reader: JoinHandle<()>,
    /// Set by whoever ends the connection first; guards the single `on_close`.
    closed: Arc<AtomicBool>,
}

struct Shared {
    handler: Arc<dyn LiveHandler>,
    state: RwLock<SessionState>,
    status: Mutex<ServerStatus>,
    assembler: Mutex<TurnAssembler>,
    usage: Mutex<UsageRecord>,
    session_id: RwLock<Option<String>>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    /// Bumped on every connect so a stale dispatch task cannot touch a newer connection.
    epoch: AtomicU64,
    link: tokio::sync::Mutex<Option<Link>>,
}

enum Frame {
    Payload(Result<String>),
    Close(Option<(u16, String)>),
    Control,
}

fn decode_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Payload(Ok(text.as_str().to_owned())),
        // The service sends JSON in binary frames as well.
        Message::Binary(bytes) => Frame::Payload(String::from_utf8(bytes.to_vec()).map_err(|e| {
            LiveError::protocol(format!("Invalid UTF-8 in binary message: {}", e))
        })),
        Message::Close(frame) => {
            Frame::Close(frame.map(|f| (u16::from(f.code), f.reason.as_str().to_owned())))
        }
        _ => Frame::Control,
    }
}

impl Shared {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn set_status(&self, status: ServerStatus) {
        let changed = {
            let mut current = self.status.lock();
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        };
        if changed {
            debug!(%status, "Server status changed");
            self.handler.on_status(status);
        }
    }

    fn dispatch(&self, raw: &str, epoch: u64) {
        match ServerMessage::parse(raw) {
            Ok(message) => self.process(&message, epoch),
            Err(e) => {
                warn!(error = %e, "Skipping malformed server message");
                self.handler.on_error(&e);
            }
        }
    }

    fn process(&self, message: &ServerMessage, epoch: u64) {
        self.handler.on_message(message);

        if let Some(metadata) = &message.usage_metadata {
            let usage = UsageRecord::from_metadata(metadata);
            *self.usage.lock() += usage;
            debug!(
                input_text = usage.input.text_tokens,
                input_audio = usage.input.audio_tokens,
                output_text = usage.output.text_tokens,
                output_audio = usage.output.audio_tokens,
                "Usage report"
            );
            self.handler.on_usage(&usage);
        }

        if let Some(go_away) = &message.go_away {
            warn!(time_left = ?go_away.time_left, "Server announced it will close the connection");
        }

        // Turn callbacks run under the assembler lock; `disconnect` takes it before closing.
        let mut assembler = self.assembler.lock();
        let connected =
            *self.state.read() == SessionState::Connected && self.is_current(epoch);
        if !connected {
            debug!("Ignoring turn content received while not connected");
            return;
        }

        for payload in message.audio_fragments() {
            if let Err(e) = assembler.push_fragment(payload) {
                warn!(error = %e, "Dropping undecodable audio fragment");
                self.handler.on_error(&e);
            }
        }
        if message.is_interrupted() {
            let bytes = assembler.interrupt();
            info!(discarded_bytes = bytes, "Turn interrupted");
            self.handler.on_interrupted(bytes);
        }
        if message.is_turn_complete() {
            if let Some(turn) = assembler.complete() {
                info!(bytes = turn.audio.len(), fragments = turn.fragment_count, "Turn complete");
                self.handler.on_turn_complete(turn);
            }
        }
        drop(assembler);

        if let Some(status) = ServerStatus::from_message(message) {
            self.set_status(status);
        }
    }

    /// Tear down after the remote side ended the connection.
    fn finish(&self, epoch: u64, closed: &AtomicBool, reason: CloseReason) {
        if closed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut assembler = self.assembler.lock();
            let mut state = self.state.write();
            if !self.is_current(epoch) {
                return;
            }
            *state = SessionState::Disconnected;
            assembler.reset();
        }
        self.set_status(ServerStatus::Disconnected);
        info!(code = ?reason.code, reason = %reason.reason, "Connection closed by server");
        self.handler.on_close(&reason);
    }
}

async fn run_reader(shared: Arc<Shared>, mut source: WsSource, closed: Arc<AtomicBool>, epoch: u64) {
    loop {
        match source.next().await {
            Some(Ok(message)) => match decode_frame(message) {
                Frame::Payload(Ok(text)) => shared.dispatch(&text, epoch),
                Frame::Payload(Err(e)) => {
                    warn!(error = %e, "Skipping undecodable frame");
                    shared.handler.on_error(&e);
                }
                Frame::Close(frame) => {
                    let reason = match frame {
                        Some((code, reason)) => CloseReason::remote(Some(code), reason),
                        None => CloseReason::remote(None, ""),
                    };
                    shared.finish(epoch, &closed, reason);
                    return;
                }
                Frame::Control => {}
            },
            Some(Err(e)) => {
                let err = LiveError::connection(format!("Receive error: {}", e));
                error!(error = %err, "Transport failure");
                shared.handler.on_error(&err);
                shared.finish(epoch, &closed, CloseReason::remote(None, e.to_string()));
                return;
            }
            None => {
                shared.finish(epoch, &closed, CloseReason::remote(None, "stream ended"));
                return;
            }
        }
    }
}

/// A live speech session.
///
/// Construct one per conversation and share it behind an `Arc` when sends and
/// lifecycle calls come from different tasks.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use vocalink_live::{ChannelHandler, LiveConfig, LiveEvent, LiveSession};
///
/// let (handler, mut events) = ChannelHandler::new();
/// let session = LiveSession::new(LiveConfig::new(api_key).with_voice("Kore"), Arc::new(handler));
/// session.connect().await?;
/// session.send_audio(&pcm_base64).await;
///
/// while let Some(event) = events.recv().await {
///     if let LiveEvent::TurnComplete(turn) = event {
///         play(turn.to_base64());
///     }
/// }
/// ```
pub struct LiveSession {
    config: LiveConfig,
    shared: Arc<Shared>,
}

impl LiveSession {
    /// Create a disconnected session.
    pub fn new(config: LiveConfig, handler: Arc<dyn LiveHandler>) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                handler,
                state: RwLock::new(SessionState::Disconnected),
                status: Mutex::new(ServerStatus::Disconnected),
                assembler: Mutex::new(TurnAssembler::new()),
                usage: Mutex::new(UsageRecord::default()),
                session_id: RwLock::new(None),
                cancel: Mutex::new(None),
                epoch: AtomicU64::new(0),
                link: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.read()
    }

    /// Whether the session is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Last observed server status.
    pub fn status(&self) -> ServerStatus {
        *self.shared.status.lock()
    }

    /// Identifier of the current (or last) connection.
    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id.read().clone()
    }

    /// Usage accumulated since the last connect.
    pub fn usage_totals(&self) -> UsageRecord {
        *self.shared.usage.lock()
    }

    /// Open the connection and complete the setup handshake.
    ///
    /// Suspends until the server acknowledges setup. Fails with
    /// `ConnectionError` if the transport or the server rejects the handshake,
    /// `Timeout` if a connect timeout is configured and elapses, and
    /// `Cancelled` if `disconnect` is called meanwhile. Calling it while
    /// already connecting or connected does nothing.
    pub async fn connect(&self) -> Result<()> {
        self.config.validate()?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let epoch = {
            let mut state = self.shared.state.write();
            if *state != SessionState::Disconnected {
                warn!(state = ?*state, "connect called on an active session, ignoring");
                return Ok(());
            }
            *state = SessionState::Connecting;
            *self.shared.cancel.lock() = Some(cancel_tx);
            self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!(model = %self.config.model, "Connecting to live service");

        let outcome = tokio::select! {
            _ = cancel_rx => Err(LiveError::Cancelled),
            result = self.handshake_with_timeout() => result,
        };
        self.shared.cancel.lock().take();

        let (sink, source, ack) = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                let mut state = self.shared.state.write();
                if self.shared.is_current(epoch) && *state == SessionState::Connecting {
                    *state = SessionState::Disconnected;
                }
                if e.is_transport() {
                    error!(error = %e, "Connect failed");
                } else {
                    info!(error = %e, "Connect did not complete");
                }
                return Err(e);
            }
        };

        let mut link_slot = self.shared.link.lock().await;
        let session_id = uuid::Uuid::new_v4().to_string();
        let still_wanted = {
            let mut assembler = self.shared.assembler.lock();
            let mut state = self.shared.state.write();
            let wanted = self.shared.is_current(epoch) && *state == SessionState::Connecting;
            if wanted {
                assembler.reset();
                *self.shared.usage.lock() = UsageRecord::default();
                *self.shared.session_id.write() = Some(session_id.clone());
                *state = SessionState::Connected;
            }
            wanted
        };
        if !still_wanted {
            drop(link_slot);
            let mut sink = sink;
            let _ = sink.close().await;
            info!("Connect finished after disconnect, closing the new connection");
            return Err(LiveError::Cancelled);
        }

        info!(%session_id, "Live session connected");
        // The acknowledgement goes out before any message the reader sees.
        self.shared.process(&ack, epoch);

        let closed = Arc::new(AtomicBool::new(false));
        let span = tracing::info_span!("live_session", %session_id);
        let reader = tokio::spawn(
            run_reader(self.shared.clone(), source, closed.clone(), epoch).instrument(span),
        );
        *link_slot = Some(Link { sink: Arc::new(tokio::sync::Mutex::new(sink)), reader, closed });
        Ok(())
    }

    async fn handshake_with_timeout(&self) -> Result<(WsSink, WsSource, ServerMessage)> {
        match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.handshake()).await.map_err(|_| {
                LiveError::Timeout(format!("setup not acknowledged within {:?}", limit))
            })?,
            None => self.handshake().await,
        }
    }

    async fn handshake(&self) -> Result<(WsSink, WsSource, ServerMessage)> {
        let url = self.config.connection_url()?;
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| LiveError::connection(format!("WebSocket connect error: {}", e)))?;
        let (mut sink, mut source) = stream.split();

        let setup = ClientMessage::setup(&self.config).to_json()?;
        info!(model_id = %self.config.model, "Sending setup message");
        debug!(raw_setup = %setup, "Raw setup message");
        sink.send(Message::Text(setup.into()))
            .await
            .map_err(|e| LiveError::connection(format!("Send error: {}", e)))?;

        loop {
            let message = match source.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return Err(LiveError::connection(format!("Receive error: {}", e)));
                }
                None => {
                    return Err(LiveError::connection("Connection ended before setup completed"));
                }
            };
            match decode_frame(message) {
                Frame::Payload(Ok(text)) => match ServerMessage::parse(&text) {
                    Ok(parsed) if parsed.is_setup_complete() => return Ok((sink, source, parsed)),
                    Ok(_) => debug!(raw = %text, "Ignoring message before setup completed"),
                    Err(e) => warn!(error = %e, "Ignoring malformed message during setup"),
                },
                Frame::Payload(Err(e)) => warn!(error = %e, "Ignoring frame during setup"),
                Frame::Close(frame) => {
                    let detail = frame
                        .map(|(code, reason)| format!("code {}: {}", code, reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Err(LiveError::connection(format!(
                        "Server closed the connection during setup ({})",
                        detail
                    )));
                }
                Frame::Control => {}
            }
        }
    }

    /// Close the connection if open. Idempotent; always ends `Disconnected`.
    ///
    /// A pending `connect` is cancelled and returns `Cancelled`.
    pub async fn disconnect(&self) {
        let previous = {
            let mut assembler = self.shared.assembler.lock();
            assembler.reset();
            std::mem::replace(&mut *self.shared.state.write(), SessionState::Disconnected)
        };
        if let Some(cancel) = self.shared.cancel.lock().take() {
            let _ = cancel.send(());
        }

        let link = self.shared.link.lock().await.take();

        let Some(link) = link else {
            if previous == SessionState::Connecting {
                info!("Pending connect cancelled");
            }
            self.shared.set_status(ServerStatus::Disconnected);
            return;
        };

        link.reader.abort();
        if let Err(e) = link.sink.lock().await.close().await {
            debug!(error = %e, "Close frame not delivered");
        }
        if !link.closed.swap(true, Ordering::SeqCst) {
            self.shared.set_status(ServerStatus::Disconnected);
            info!(session_id = ?self.session_id(), "Live session disconnected");
            self.shared.handler.on_close(&CloseReason::local());
        }
    }

    /// Forward base64 PCM16 16kHz mono audio as realtime input.
    ///
    /// Logs a warning and writes nothing when not connected. Transport
    /// failures go to `on_error`. Returns whether the message was written.
    pub async fn send_audio(&self, audio_base64: &str) -> bool {
        let sent = self.send(ClientMessage::audio(audio_base64), "audio").await;
        if sent && self.config.clear_turn_on_send {
            self.shared.assembler.lock().reset();
        }
        sent
    }

    /// Encode and forward an audio chunk.
    pub async fn send_audio_chunk(&self, chunk: &AudioChunk) -> bool {
        if chunk.format.sample_rate != crate::audio::INPUT_SAMPLE_RATE {
            warn!(
                sample_rate = chunk.format.sample_rate,
                "Audio chunk is not 16kHz, the service will misinterpret it"
            );
        }
        self.send_audio(&chunk.to_base64()).await
    }

    /// Tell the service the audio stream paused or ended.
    pub async fn end_audio_stream(&self) -> bool {
        self.send(ClientMessage::audio_stream_end(), "audio_stream_end").await
    }

    /// Send a complete user text turn.
    pub async fn send_text(&self, text: &str) -> bool {
        self.send(ClientMessage::user_text(text), "text").await
    }

    async fn send(&self, message: ClientMessage, kind: &'static str) -> bool {
        if !self.is_connected() {
            warn!(kind, state = ?self.state(), "Not connected, dropping outbound message");
            return false;
        }
        let sink = match self.shared.link.lock().await.as_ref() {
            Some(link) => link.sink.clone(),
            None => {
                warn!(kind, "No open connection, dropping outbound message");
                return false;
            }
        };
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                self.shared.handler.on_error(&e);
                return false;
            }
        };

        let result = sink.lock().await.send(Message::Text(payload.into())).await;
        match result {
            Ok(()) => true,
            Err(e) => {
                let err = LiveError::connection(format!("Send error: {}", e));
                error!(kind, error = %err, "Failed to send");
                self.shared.handler.on_error(&err);
                false
            }
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(cancel) = self.shared.cancel.lock().take() {
            let _ = cancel.send(());
        }
        if let Ok(mut slot) = self.shared.link.try_lock() {
            if let Some(link) = slot.take() {
                link.reader.abort();
            }
        }
    }
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("session_id", &self.session_id())
            .field("state", &self.state())
            .field("status", &self.status())
            .finish()
    }
}
