//! Gemini Live API provider.
//!
//! Connects to Google's WebSocket-based Live API:
//!
//! - Input audio: 16kHz mono PCM, sent as `realtimeInput` media chunks
//! - Output audio: 24kHz mono PCM, received as inline data parts
//! - Typed text is sent as a complete user turn
//!
//! # Example
//!
//! ```rust,ignore
//! use anas_live::gemini::GeminiLiveTransport;
//! use anas_live::{LiveCallClient, LiveConfig};
//!
//! let config = LiveConfig::new(std::env::var("GOOGLE_API_KEY")?);
//! let transport = GeminiLiveTransport::from_config(&config);
//! ```

mod model;
mod protocol;
mod session;

pub use model::GeminiLiveTransport;
pub use session::GeminiLiveSession;

use std::time::Duration;

/// Gemini Live API WebSocket URL.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// How long to wait for `setupComplete` after sending the setup message.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Prebuilt voices offered by the Live API.
pub const GEMINI_VOICES: &[&str] = &["Puck", "Charon", "Kore", "Fenrir", "Aoede"];
