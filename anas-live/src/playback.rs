//! Gapless scheduling of received speech.
//!
//! Segments are laid end to end on the output clock. A cursor tracks where
//! the next segment starts; if playback has stalled and the cursor fell
//! behind the clock, it jumps forward to "now" instead of scheduling in the
//! past.

use crate::audio::PlaybackSegment;
use crate::device::{OutputContext, SourceId};
use crate::error::{LiveError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// A segment handed to the output context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    /// Output context handle.
    pub id: SourceId,
    /// Arrival order within the call.
    pub seq: u64,
    /// Start time on the output clock, in seconds.
    pub start: f64,
    /// Length in seconds.
    pub duration: f64,
}

impl ScheduledSource {
    /// Time at which the source finishes.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug)]
struct SchedulerState {
    next_start: f64,
    active: Vec<ScheduledSource>,
    next_seq: u64,
    closed: bool,
}

/// Schedules decoded segments back to back on an [`OutputContext`].
pub struct PlaybackScheduler {
    output: Arc<dyn OutputContext>,
    state: Mutex<SchedulerState>,
}

impl PlaybackScheduler {
    /// Create a scheduler whose cursor starts at the output clock's "now".
    pub fn new(output: Arc<dyn OutputContext>) -> Self {
        let now = output.current_time();
        let state = SchedulerState { next_start: now, active: Vec::new(), next_seq: 0, closed: false };
        Self { output, state: Mutex::new(state) }
    }

    /// Schedule `segment` right after everything already queued.
    ///
    /// Fails with [`LiveError::NotConnected`] after [`Self::close`].
    pub fn enqueue(&self, segment: PlaybackSegment) -> Result<ScheduledSource> {
        if segment.is_empty() {
            return Err(LiveError::malformed("empty speech segment"));
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(LiveError::NotConnected);
        }
        let now = self.output.current_time();
        state.active.retain(|s| s.end() > now);

        if state.next_start < now {
            tracing::debug!(behind = now - state.next_start, "Playback stalled, cursor moved to now");
            state.next_start = now;
        }

        let seq = state.next_seq;
        let segment = segment.with_seq(seq);
        let start = state.next_start;
        let id = self.output.start_source(&segment, start)?;
        let source = ScheduledSource { id, seq, start, duration: segment.duration_secs() };

        state.next_seq += 1;
        state.next_start = source.end();
        state.active.push(source);

        tracing::trace!(seq, start, duration = source.duration, "Segment scheduled");
        Ok(source)
    }

    /// Stop everything that is playing or queued.
    ///
    /// Returns the number of sources stopped. The cursor is reset to the
    /// current clock time.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.state.lock();
        self.stop_all(&mut state)
    }

    /// Stop everything and refuse further segments.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        self.stop_all(&mut state)
    }

    fn stop_all(&self, state: &mut SchedulerState) -> usize {
        let stopped = state.active.len();
        for source in state.active.drain(..) {
            if let Err(e) = self.output.stop_source(source.id) {
                tracing::warn!(source = source.id, error = %e, "Failed to stop source");
            }
        }
        state.next_start = self.output.current_time();
        if stopped > 0 {
            tracing::debug!(stopped, "Playback cancelled");
        }
        stopped
    }

    /// Where the next segment will start.
    pub fn next_start(&self) -> f64 {
        self.state.lock().next_start
    }

    /// Number of sources still playing or waiting to play.
    pub fn active_count(&self) -> usize {
        self.active_sources().len()
    }

    /// Sources still playing or waiting to play, in start order.
    pub fn active_sources(&self) -> Vec<ScheduledSource> {
        let mut state = self.state.lock();
        let now = self.output.current_time();
        state.active.retain(|s| s.end() > now);
        state.active.clone()
    }
}
