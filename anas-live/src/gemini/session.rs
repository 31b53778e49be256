use super::protocol::{GeminiClientMessage, translate_server_message};
use crate::audio::EncodedFrame;
use crate::error::{LiveError, Result};
use crate::events::ServerEvent;
use crate::transport::{LiveConnection, SessionSetup};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// Gemini Live connection.
///
/// Owns one WebSocket to the Live API. The sink and source are locked
/// separately so the writer task and the reader task never wait on each
/// other.
pub struct GeminiLiveSession {
    session_id: String,
    connected: Arc<AtomicBool>,
    sender: Arc<Mutex<WsSink>>,
    receiver: Arc<Mutex<WsSource>>,
    pending: parking_lot::Mutex<VecDeque<ServerEvent>>,
}

impl GeminiLiveSession {
    /// Open the WebSocket at `url`, send the setup message and wait for the
    /// server to acknowledge it.
    pub async fn connect(url: &str, setup: &SessionSetup, handshake_timeout: Duration) -> Result<Self> {
        ensure_crypto_provider();

        let request = url
            .into_client_request()
            .map_err(|e| LiveError::transport(format!("Failed to create client request: {e}")))?;
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| LiveError::transport(format!("WebSocket connect error: {e}")))?;

        let (sink, source) = stream.split();

        let session = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            connected: Arc::new(AtomicBool::new(true)),
            sender: Arc::new(Mutex::new(sink)),
            receiver: Arc::new(Mutex::new(source)),
            pending: parking_lot::Mutex::new(VecDeque::new()),
        };

        tracing::info!(model_id = %setup.model, voice = %setup.voice, "Sending setup message");
        session
            .send_raw(&GeminiClientMessage::setup(setup))
            .await
            .map_err(|e| LiveError::transport(format!("Setup failed: {e}")))?;

        match tokio::time::timeout(handshake_timeout, session.await_setup_complete()).await {
            Ok(Ok(())) => Ok(session),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LiveError::transport(format!(
                "No setup acknowledgement within {}s",
                handshake_timeout.as_secs()
            ))),
        }
    }

    async fn await_setup_complete(&self) -> Result<()> {
        let mut early = Vec::new();
        loop {
            match self.receive_raw().await {
                Some(Ok(ServerEvent::SetupComplete)) => {
                    tracing::debug!(session_id = %self.session_id, "Setup acknowledged");
                    // Anything that arrived first is still delivered, ahead of later events.
                    let mut pending = self.pending.lock();
                    for event in early.into_iter().rev() {
                        pending.push_front(event);
                    }
                    return Ok(());
                }
                Some(Ok(event)) => {
                    tracing::debug!(kind = event.kind(), "Event before setup acknowledgement");
                    early.push(event);
                }
                Some(Err(e)) => return Err(LiveError::transport(format!("Handshake failed: {e}"))),
                None => return Err(LiveError::transport("Connection closed during handshake")),
            }
        }
    }

    /// Send a raw message.
    async fn send_raw<T: Serialize>(&self, value: &T) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LiveError::send("connection is closed"));
        }

        let msg = serde_json::to_string(value)?;

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(msg.into()))
            .await
            .map_err(|e| LiveError::send(format!("Send error: {e}")))?;

        Ok(())
    }

    /// Receive the next event, reading from the socket when none is queued.
    async fn receive_raw(&self) -> Option<Result<ServerEvent>> {
        if let Some(event) = self.pending.lock().pop_front() {
            return Some(Ok(event));
        }

        let mut receiver = self.receiver.lock().await;
        loop {
            let text = match receiver.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => text.to_string(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring non UTF-8 binary message");
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server closed the connection");
                    self.connected.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Some(Err(LiveError::transport(format!("Receive error: {e}"))));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return None;
                }
            };

            let events = match translate_server_message(&text) {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unparseable server message");
                    continue;
                }
            };

            let mut pending = self.pending.lock();
            pending.extend(events);
            if let Some(event) = pending.pop_front() {
                return Some(Ok(event));
            }
        }
    }
}

#[async_trait]
impl LiveConnection for GeminiLiveSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_audio(&self, frame: &EncodedFrame) -> Result<()> {
        self.send_raw(&GeminiClientMessage::audio(frame)).await
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.send_raw(&GeminiClientMessage::text(text)).await
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        self.receive_raw().await
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Close(None))
            .await
            .map_err(|e| LiveError::transport(format!("Close error: {e}")))?;
        Ok(())
    }
}

fn ensure_crypto_provider() {
    // Fails only when a provider is already installed.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
