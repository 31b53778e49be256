//! Event types exchanged with the live endpoint.
//!
//! These are provider independent; the Gemini transport translates its wire
//! messages into [`ServerEvent`]s and [`ClientEvent`]s into wire messages.
//! Audio is carried as raw bytes here, decoded from transport text at the
//! transport boundary.

use crate::audio::EncodedFrame;
use bytes::Bytes;

/// Messages queued by the client for the transport, sent strictly in order.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// One captured microphone frame.
    Audio(EncodedFrame),
    /// A typed user turn injected into the conversation.
    Text(String),
}

impl ClientEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Audio(_) => "audio",
            Self::Text(_) => "text",
        }
    }
}

/// Events received from the live endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The session handshake completed.
    SetupComplete,

    /// A chunk of synthesized speech (PCM16 little-endian bytes).
    Audio {
        /// Raw PCM bytes.
        data: Bytes,
    },

    /// Text produced by the model alongside or instead of audio.
    Text {
        /// Text content.
        text: String,
    },

    /// The user started speaking while the model was talking.
    Interrupted,

    /// The model finished its turn.
    TurnComplete,

    /// The server will close the connection soon.
    GoAway {
        /// Remaining time as reported by the server (e.g. `"10s"`).
        time_left: Option<String>,
    },

    /// Unknown event type (for forward compatibility).
    Unknown,
}

impl ServerEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetupComplete => "setup_complete",
            Self::Audio { .. } => "audio",
            Self::Text { .. } => "text",
            Self::Interrupted => "interrupted",
            Self::TurnComplete => "turn_complete",
            Self::GoAway { .. } => "go_away",
            Self::Unknown => "unknown",
        }
    }
}
