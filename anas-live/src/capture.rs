//! Microphone capture pipeline.
//!
//! Frames go out as soon as they are captured: each one is encoded and
//! pushed onto the outbound queue without waiting for the network. While
//! muted, frames are discarded rather than buffered, so unmuting never
//! releases a backlog.

use crate::audio::{AudioFormat, EncodedFrame};
use crate::device::FrameSink;
use crate::events::ClientEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Shared mute flag. Written by the controller, read on the capture thread.
#[derive(Debug, Clone, Default)]
pub struct MuteSwitch {
    muted: Arc<AtomicBool>,
}

impl MuteSwitch {
    /// Create a switch in the given position.
    pub fn new(muted: bool) -> Self {
        Self { muted: Arc::new(AtomicBool::new(muted)) }
    }

    /// Set the mute flag.
    pub fn set(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    /// Whether captured frames are currently discarded.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}

/// Encodes captured frames and queues them for the transport.
pub struct CapturePipeline {
    format: AudioFormat,
    mute: MuteSwitch,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl CapturePipeline {
    /// Create a pipeline feeding `outbound`.
    pub fn new(
        format: AudioFormat,
        mute: MuteSwitch,
        outbound: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        Self { format, mute, outbound, forwarded: AtomicU64::new(0), dropped: AtomicU64::new(0) }
    }

    /// Frames handed to the outbound queue.
    pub fn frames_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Frames discarded because the call was muted.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameSink for CapturePipeline {
    fn on_frame(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        if self.mute.is_muted() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(samples = samples.len(), "Muted, frame dropped");
            return;
        }

        let frame = EncodedFrame::encode(samples, self.format);
        let bytes = frame.data.len();
        if self.outbound.send(ClientEvent::Audio(frame)).is_err() {
            tracing::debug!("Outbound queue closed, frame dropped");
            return;
        }
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(bytes, "Frame queued");
    }
}
