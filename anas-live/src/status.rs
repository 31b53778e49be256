//! UI-facing call status and the observer interface.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Status values reported to the UI on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Opening devices and the transport.
    Connecting,
    /// Transport open.
    Connected,
    /// Waiting for the user to speak.
    Listening,
    /// Assistant speech is playing.
    Speaking,
    /// The call failed.
    Error,
    /// The call ended.
    Disconnected,
}

/// Language of user-facing status labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English labels.
    #[serde(alias = "en")]
    English,
    /// Central Kurdish (Sorani), Arabic script.
    #[default]
    #[serde(alias = "ckb")]
    Sorani,
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "ckb" | "sorani" => Ok(Self::Sorani),
            other => Err(format!("unknown locale '{other}' (expected en or ckb)")),
        }
    }
}

impl CallStatus {
    /// Wire/log name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether the call view should close after this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Disconnected)
    }

    /// Label shown to the user.
    pub fn localized(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::English => match self {
                Self::Connecting => "Connecting...",
                Self::Connected => "Connected",
                Self::Listening => "Listening...",
                Self::Speaking => "Speaking...",
                Self::Error => "Something went wrong",
                Self::Disconnected => "Call ended",
            },
            Locale::Sorani => match self {
                Self::Connecting => "پەیوەندی دەبەستێت...",
                Self::Connected => "پەیوەندی بەسترا",
                Self::Listening => "گوێ دەگرێت...",
                Self::Speaking => "قسە دەکات...",
                Self::Error => "کێشەیەک ڕوویدا",
                Self::Disconnected => "پەیوەندی بچڕا",
            },
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives status changes of one call.
///
/// Called from the controller's tasks; implementations must not block.
pub trait CallObserver: Send + Sync {
    /// Called after every state change.
    fn on_status(&self, status: CallStatus);
}

/// Observer backed by a closure.
pub struct FnObserver<F>
where
    F: Fn(CallStatus) + Send + Sync,
{
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(CallStatus) + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> CallObserver for FnObserver<F>
where
    F: Fn(CallStatus) + Send + Sync,
{
    fn on_status(&self, status: CallStatus) {
        (self.callback)(status)
    }
}

/// Observer that forwards statuses into a channel for async consumers.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<CallStatus>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CallStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CallObserver for ChannelObserver {
    fn on_status(&self, status: CallStatus) {
        // Receiver gone means the UI stopped caring.
        let _ = self.tx.send(status);
    }
}

/// Default no-op observer.
#[derive(Debug, Clone, Default)]
pub struct NoOpObserver;

impl CallObserver for NoOpObserver {
    fn on_status(&self, _status: CallStatus) {}
}
