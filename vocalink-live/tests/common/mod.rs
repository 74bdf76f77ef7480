//! Scripted mock of the Live service for session tests.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing_subscriber::EnvFilter;
use vocalink_live::{LiveConfig, LiveEvent};

/// One scripted server action, run after the setup message is received.
pub enum Step {
    /// Send JSON as a text frame.
    Send(Value),
    /// Send JSON as a binary frame.
    SendBinary(Value),
    /// Send an arbitrary text frame.
    SendRaw(String),
    /// Wait for the next client message.
    AwaitClient,
    Sleep(Duration),
    /// Send a close frame and stop.
    Close(u16, String),
}

pub struct MockLive {
    pub endpoint: String,
    received: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl MockLive {
    /// Accept one connection and play `steps` against it.
    pub async fn start(steps: Vec<Step>) -> Self {
        Self::start_many(vec![steps]).await
    }

    /// Accept one connection per script, in order.
    pub async fn start_many(scripts: Vec<Vec<Step>>) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let record = received.clone();
        let task = tokio::spawn(async move {
            for steps in scripts {
                let Ok((stream, _)) = listener.accept().await else { return };
                play(stream, steps, &record).await;
            }
        });

        Self { endpoint: format!("ws://{}", addr), received, task }
    }

    /// Client config pointed at this server.
    pub fn config(&self) -> LiveConfig {
        LiveConfig::new("test-key").with_endpoint(self.endpoint.clone())
    }

    pub async fn received(&self) -> Vec<Value> {
        self.received.lock().await.clone()
    }

    /// Wait until at least `count` client messages arrived.
    pub async fn wait_for_received(&self, count: usize) -> Vec<Value> {
        for _ in 0..200 {
            let received = self.received().await;
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} client messages, got {:?}", count, self.received().await);
    }
}

impl Drop for MockLive {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn play(stream: tokio::net::TcpStream, steps: Vec<Step>, record: &Mutex<Vec<Value>>) {
    let Ok(ws) = accept_async(stream).await else { return };
    let (mut write, mut read) = ws.split();

    if !read_client(&mut read, record).await {
        return;
    }

    for step in steps {
        let sent = match step {
            Step::Send(value) => write.send(Message::Text(value.to_string().into())).await,
            Step::SendBinary(value) => {
                write.send(Message::Binary(value.to_string().into_bytes().into())).await
            }
            Step::SendRaw(raw) => write.send(Message::Text(raw.into())).await,
            Step::AwaitClient => {
                if !read_client(&mut read, record).await {
                    return;
                }
                Ok(())
            }
            Step::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Step::Close(code, reason) => {
                let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                let _ = write.send(Message::Close(Some(frame))).await;
                return;
            }
        };
        if sent.is_err() {
            return;
        }
    }

    // Keep recording until the client goes away.
    while read_client(&mut read, record).await {}
}

/// Route session logs to the test writer; `RUST_LOG` overrides the `warn` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Read one data message and record it. Returns `false` once the client is gone.
async fn read_client<S>(read: &mut S, record: &Mutex<Vec<Value>>) -> bool
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                record.lock().await.push(value);
                return true;
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return false,
            Some(Ok(_)) => continue,
        }
    }
}

pub fn setup_complete() -> Step {
    Step::Send(json!({"setupComplete": {}}))
}

pub fn audio_fragment(data: &str) -> Step {
    Step::Send(json!({
        "serverContent": {
            "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": data}}]}
        }
    }))
}

pub fn turn_complete() -> Step {
    Step::Send(json!({"serverContent": {"turnComplete": true}}))
}

pub fn interrupted() -> Step {
    Step::Send(json!({"serverContent": {"interrupted": true}}))
}

/// Next event matching `pred`, skipping the rest. Panics after two seconds.
pub async fn next_matching<F>(rx: &mut mpsc::UnboundedReceiver<LiveEvent>, mut pred: F) -> LiveEvent
where
    F: FnMut(&LiveEvent) -> bool,
{
    let wait = async {
        while let Some(event) = rx.recv().await {
            if pred(&event) {
                return event;
            }
        }
        panic!("event channel closed");
    };
    tokio::time::timeout(Duration::from_secs(2), wait).await.expect("timed out waiting for event")
}

/// Collect every event that arrives within `window`.
pub async fn drain(rx: &mut mpsc::UnboundedReceiver<LiveEvent>, window: Duration) -> Vec<LiveEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        events.push(event);
    }
    events
}
