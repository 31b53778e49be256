//! Transport traits: the duplex channel to the live endpoint.

use crate::audio::EncodedFrame;
use crate::config::VoiceProfile;
use crate::error::Result;
use crate::events::{ClientEvent, ServerEvent};
use async_trait::async_trait;

/// Everything the endpoint needs during the connect handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    /// Model identifier.
    pub model: String,
    /// Voice used for synthesized speech.
    pub voice: VoiceProfile,
    /// Persona plus real-time directive.
    pub system_instruction: String,
}

/// A factory for live connections.
///
/// # Example
///
/// ```rust,ignore
/// use anas_live::gemini::GeminiLiveTransport;
/// use anas_live::{LiveTransport, SessionSetup, VoiceProfile};
///
/// let transport = GeminiLiveTransport::new(api_key, "models/gemini-2.5-flash-native-audio-preview-09-2025");
/// let connection = transport
///     .connect(SessionSetup {
///         model: transport.model_id().to_string(),
///         voice: VoiceProfile::Female,
///         system_instruction: "Be brief.".to_string(),
///     })
///     .await?;
/// ```
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Get the provider name (e.g., "gemini").
    fn provider(&self) -> &str;

    /// Get the model identifier.
    fn model_id(&self) -> &str;

    /// Open a connection and complete the handshake.
    ///
    /// Returns only once the endpoint accepted the setup; failures map to
    /// [`LiveError::Transport`](crate::LiveError::Transport).
    async fn connect(&self, setup: SessionSetup) -> Result<BoxedConnection>;
}

/// An open, handshaken connection.
///
/// All methods take `&self` so one task can send while another receives.
#[async_trait]
pub trait LiveConnection: Send + Sync {
    /// Get the session ID.
    fn session_id(&self) -> &str;

    /// Check if the connection is still open.
    fn is_connected(&self) -> bool;

    /// Send one encoded microphone frame.
    async fn send_audio(&self, frame: &EncodedFrame) -> Result<()>;

    /// Send a typed user turn.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Get the next event from the server.
    ///
    /// Returns `None` once the server closed the connection.
    async fn next_event(&self) -> Option<Result<ServerEvent>>;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<()>;

    /// Send a queued client event.
    async fn send_event(&self, event: &ClientEvent) -> Result<()> {
        match event {
            ClientEvent::Audio(frame) => self.send_audio(frame).await,
            ClientEvent::Text(text) => self.send_text(text).await,
        }
    }
}

/// A boxed transport for dynamic dispatch.
pub type BoxedTransport = std::sync::Arc<dyn LiveTransport>;

/// A boxed connection for dynamic dispatch.
pub type BoxedConnection = Box<dyn LiveConnection>;
