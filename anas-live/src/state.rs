//! The call state machine.
//!
//! ```text
//! idle ──connect──▶ connecting ──opened──▶ connected ──capture started──▶ listening
//!                                                                          ▲     │
//!                                              interrupted / turn complete │     │ server audio
//!                                                                          │     ▼
//!                                                                         speaking
//!
//! any non-idle state ──fatal──▶ error
//! any non-idle state ──closed / hangup──▶ disconnected
//! ```
//!
//! [`CallState::transition`] is pure; the controller applies it under its
//! state lock and notifies observers when the state actually changes.

use crate::error::{LiveError, Result};
use crate::status::CallStatus;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No call has been placed.
    #[default]
    Idle,
    /// Devices are being opened and the transport handshake is running.
    Connecting,
    /// Transport is open; capture is about to start.
    Connected,
    /// Microphone streaming, assistant silent.
    Listening,
    /// Assistant audio is being played.
    Speaking,
    /// Terminal: the call failed.
    Error,
    /// Terminal: the call ended.
    Disconnected,
}

/// Inputs that drive [`CallState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallEvent {
    /// User asked to place a call.
    Connect,
    /// Transport handshake completed.
    Opened,
    /// Microphone frames are flowing.
    CaptureStarted,
    /// A speech segment arrived from the server.
    ServerAudio,
    /// Server signalled that the user barged in.
    ServerInterrupted,
    /// Server finished its turn.
    ServerTurnComplete,
    /// Transport closed by the remote end.
    TransportClosed,
    /// Fatal device or transport failure.
    Fatal,
    /// User hung up.
    Hangup,
}

impl CallState {
    /// Compute the state that follows `event`.
    ///
    /// Returns [`LiveError::InvalidTransition`] for events the current state
    /// does not accept. From [`CallState::Idle`] only [`CallEvent::Connect`]
    /// is valid. Hanging up a call that already ended leaves it unchanged.
    pub fn transition(self, event: CallEvent) -> Result<CallState> {
        use CallEvent as E;
        use CallState as S;

        let next = match (self, event) {
            (S::Idle, E::Connect) => S::Connecting,
            (S::Connecting, E::Opened) => S::Connected,
            (S::Connected, E::CaptureStarted) => S::Listening,
            (S::Connected | S::Listening | S::Speaking, E::ServerAudio) => S::Speaking,
            (
                S::Connected | S::Listening | S::Speaking,
                E::ServerInterrupted | E::ServerTurnComplete,
            ) => S::Listening,
            (state, E::TransportClosed) if state.is_active() => S::Disconnected,
            (state, E::Fatal) if state.is_active() => S::Error,
            (state, E::Hangup) if state.is_active() => S::Disconnected,
            (state, E::Hangup) if state.is_terminal() => state,
            (from, event) => return Err(LiveError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// Whether the call has been placed and has not ended.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle | Self::Error | Self::Disconnected)
    }

    /// Whether the call ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Disconnected)
    }

    /// Whether the transport is open for outbound traffic.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Listening | Self::Speaking)
    }

    /// UI-visible status for this state; `None` for [`CallState::Idle`].
    pub fn status(&self) -> Option<CallStatus> {
        match self {
            Self::Idle => None,
            Self::Connecting => Some(CallStatus::Connecting),
            Self::Connected => Some(CallStatus::Connected),
            Self::Listening => Some(CallStatus::Listening),
            Self::Speaking => Some(CallStatus::Speaking),
            Self::Error => Some(CallStatus::Error),
            Self::Disconnected => Some(CallStatus::Disconnected),
        }
    }
}
