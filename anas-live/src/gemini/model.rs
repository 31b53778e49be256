//! Gemini Live transport implementation.

use crate::config::LiveConfig;
use crate::error::{LiveError, Result};
use crate::transport::{BoxedConnection, LiveConnection, LiveTransport, SessionSetup};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::session::GeminiLiveSession;
use super::{GEMINI_LIVE_URL, HANDSHAKE_TIMEOUT};

/// Gemini Live transport for opening call connections.
///
/// # Example
///
/// ```rust,ignore
/// use anas_live::gemini::GeminiLiveTransport;
///
/// let transport = GeminiLiveTransport::new(api_key, "models/gemini-2.5-flash-native-audio-preview-09-2025");
/// ```
#[derive(Debug, Clone)]
pub struct GeminiLiveTransport {
    api_key: SecretString,
    model_id: String,
    endpoint: String,
    handshake_timeout: Duration,
}

impl GeminiLiveTransport {
    /// Create a new Gemini Live transport.
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model_id: model_id.into(),
            endpoint: GEMINI_LIVE_URL.to_string(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Create from a call configuration.
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model_id: config.model.clone(),
            endpoint: config.endpoint.clone().unwrap_or_else(|| GEMINI_LIVE_URL.to_string()),
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Point the transport at another WebSocket endpoint (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set how long to wait for the setup acknowledgement.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// The endpoint URL with the API key attached.
    fn connect_url(&self) -> Result<String> {
        let url = url::Url::parse_with_params(&self.endpoint, &[("key", self.api_key.expose_secret())])
            .map_err(|e| LiveError::transport(format!("Invalid endpoint '{}': {e}", self.endpoint)))?;
        Ok(url.into())
    }
}

#[async_trait]
impl LiveTransport for GeminiLiveTransport {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn connect(&self, setup: SessionSetup) -> Result<BoxedConnection> {
        let url = self.connect_url()?;
        let session = GeminiLiveSession::connect(&url, &setup, self.handshake_timeout).await?;
        tracing::info!(session_id = %session.session_id(), "Gemini Live session open");
        Ok(Box::new(session))
    }
}
