//! Error types for live calls.

use crate::state::{CallEvent, CallState};
use thiserror::Error;

/// Result type for live call operations.
pub type Result<T> = std::result::Result<T, LiveError>;

/// Errors that can occur while placing or running a live call.
#[derive(Error, Debug)]
pub enum LiveError {
    /// Microphone or speaker unavailable or access denied.
    #[error("Audio device error: {0}")]
    DeviceAccess(String),

    /// Handshake failure or mid-call network failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A received audio payload could not be decoded.
    #[error("Malformed audio: {0}")]
    MalformedAudio(String),

    /// An outbound frame or text message could not be sent.
    #[error("Send failed: {0}")]
    SendFailure(String),

    /// The operation needs an established call.
    #[error("Call not connected")]
    NotConnected,

    /// Another call is still being set up.
    #[error("A call is already being connected")]
    CallInProgress,

    /// The call was hung up before it finished connecting.
    #[error("Call hung up while connecting")]
    Cancelled,

    /// The call state machine rejected an event.
    #[error("Invalid transition: {event:?} is not valid in state {from:?}")]
    InvalidTransition {
        /// State the call was in.
        from: CallState,
        /// Event that was rejected.
        event: CallEvent,
    },

    /// Caller supplied an unusable argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LiveError {
    /// Create a new device access error.
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::DeviceAccess(msg.into())
    }

    /// Create a new transport error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new malformed audio error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedAudio(msg.into())
    }

    /// Create a new send failure.
    pub fn send<S: Into<String>>(msg: S) -> Self {
        Self::SendFailure(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error ends the call.
    ///
    /// Only device and transport failures do. Everything else is absorbed
    /// where it occurs or returned to the caller without touching the call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceAccess(_) | Self::Transport(_))
    }
}
