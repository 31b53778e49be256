//! Audio device abstractions.
//!
//! The controller never touches a sound API directly. It opens an
//! [`OutputContext`] for speech playback and an [`InputContext`] from which
//! a [`Microphone`] is acquired; both are injected through [`AudioDevices`].
//!
//! | Implementor | Where used |
//! |---|---|
//! | `desktop::DesktopAudio` | CLI, cpal capture and playback (feature `desktop-audio`) |
//! | test fakes | manual clock output, scripted microphone |
//!
//! All traits are object-safe and take `&self`; implementations use interior
//! mutability for their state.

use crate::audio::{AudioFormat, PlaybackSegment};
use crate::error::Result;
use std::sync::Arc;

/// Identifier of a scheduled playback source, unique within one output context.
pub type SourceId = u64;

/// Consumer of captured microphone frames.
///
/// Invoked from device callback threads, concurrently with network tasks.
/// Implementations must return quickly.
pub trait FrameSink: Send + Sync {
    /// Handle one frame of mono samples in `[-1, 1]`.
    fn on_frame(&self, samples: &[f32]);
}

/// Factory for the per-call audio contexts.
pub trait AudioDevices: Send + Sync {
    /// Open an output context that plays mono audio at `format`'s rate.
    fn open_output(&self, format: AudioFormat) -> Result<Arc<dyn OutputContext>>;

    /// Open an input context capturing mono audio at `format`'s rate.
    fn open_input(&self, format: AudioFormat) -> Result<Arc<dyn InputContext>>;
}

/// Audio clock plus sample-accurate source scheduling.
pub trait OutputContext: Send + Sync {
    /// Sample rate of the context.
    fn sample_rate(&self) -> u32;

    /// Current time on the output clock, in seconds.
    fn current_time(&self) -> f64;

    /// Start playing `segment` at clock time `at`.
    fn start_source(&self, segment: &PlaybackSegment, at: f64) -> Result<SourceId>;

    /// Stop a source immediately. Unknown or finished sources are ignored.
    fn stop_source(&self, id: SourceId) -> Result<()>;

    /// Release the output device.
    fn close(&self) -> Result<()>;
}

/// Capture side of a call.
pub trait InputContext: Send + Sync {
    /// Ask for microphone access.
    ///
    /// Fails with [`LiveError::DeviceAccess`](crate::LiveError::DeviceAccess)
    /// when permission is denied or no device exists.
    fn acquire_microphone(&self) -> Result<Box<dyn Microphone>>;

    /// Release the capture device.
    fn close(&self) -> Result<()>;
}

/// An acquired microphone.
pub trait Microphone: Send + Sync {
    /// Begin delivering frames of `frame_samples` samples to `sink`.
    fn start(&self, frame_samples: usize, sink: Arc<dyn FrameSink>) -> Result<()>;

    /// Stop capture and release the device.
    fn stop(&self) -> Result<()>;
}
