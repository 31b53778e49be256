//! # anas-live
//!
//! Live, bidirectional voice calls with a real-time speech model.
//!
//! The user talks, the assistant answers in synthesized speech, and either
//! side can interrupt the other. Typed text can be injected mid-call.
//!
//! ## Architecture
//!
//! ```text
//!  microphone ──▶ CapturePipeline ──▶ outbound queue ──▶ writer task ──┐
//!                   (mute, PCM16)                                     │
//!                                                              LiveConnection
//!                                                                     │
//!  speaker ◀── PlaybackScheduler ◀── decode ◀── reader task ◀─────────┘
//!                (gapless cursor)                  │
//!                                                  ▼
//!                                    CallState ──▶ CallObserver
//! ```
//!
//! ## Features
//!
//! - **Gapless playback**: speech segments are laid end to end on the output clock
//! - **Barge-in**: server interruptions silence queued speech at once
//! - **Mute**: frames are discarded while muted, never buffered
//! - **Single teardown**: every way a call ends releases devices and the
//!   connection exactly once
//! - **Providers**: Gemini Live over WebSocket (`gemini`, default)
//! - **Devices**: desktop microphone and speaker via cpal (`desktop-audio`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use anas_live::desktop::DesktopAudio;
//! use anas_live::gemini::GeminiLiveTransport;
//! use anas_live::{ChannelObserver, LiveCallClient, LiveConfig, VoiceProfile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LiveConfig::new(std::env::var("GOOGLE_API_KEY")?);
//!     let transport = Arc::new(GeminiLiveTransport::from_config(&config));
//!     let client = LiveCallClient::new(config, transport, Arc::new(DesktopAudio::new()));
//!
//!     let (observer, mut statuses) = ChannelObserver::new();
//!     let call = client.connect(VoiceProfile::Female, Arc::new(observer)).await?;
//!     while let Some(status) = statuses.recv().await {
//!         println!("{status}");
//!         if status.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod events;
pub mod playback;
pub mod state;
pub mod status;
pub mod transport;

// Provider implementations
#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "desktop-audio")]
pub mod desktop;

// Re-exports
pub use audio::{AudioFormat, EncodedFrame, PlaybackSegment};
pub use capture::{CapturePipeline, MuteSwitch};
pub use config::{LiveConfig, VoiceProfile};
pub use controller::{CallHandle, LiveCallClient};
pub use device::{AudioDevices, FrameSink, InputContext, Microphone, OutputContext, SourceId};
pub use error::{LiveError, Result};
pub use events::{ClientEvent, ServerEvent};
pub use playback::{PlaybackScheduler, ScheduledSource};
pub use state::{CallEvent, CallState};
pub use status::{CallObserver, CallStatus, ChannelObserver, FnObserver, Locale, NoOpObserver};
pub use transport::{BoxedConnection, BoxedTransport, LiveConnection, LiveTransport, SessionSetup};
