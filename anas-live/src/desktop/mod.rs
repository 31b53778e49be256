//! Desktop microphone and speaker via `cpal`.
//!
//! cpal streams are not `Send`, so each stream lives on its own thread and
//! is dropped there when a stop signal arrives over a crossbeam channel.
//! Devices run at their default config. Samples are converted from the
//! device's format and resampled to and from the call's rates.

mod input;
mod output;
mod resample;

pub use input::{DesktopInput, DesktopMicrophone};
pub use output::DesktopOutput;

use crate::audio::AudioFormat;
use crate::device::{AudioDevices, InputContext, OutputContext};
use crate::error::{LiveError, Result};
use cpal::{SampleFormat, SupportedStreamConfig};
use std::sync::Arc;

/// Default input and output devices of the system's default host.
#[derive(Debug, Clone, Default)]
pub struct DesktopAudio;

impl DesktopAudio {
    /// Create the device factory.
    pub fn new() -> Self {
        Self
    }
}

impl AudioDevices for DesktopAudio {
    fn open_output(&self, format: AudioFormat) -> Result<Arc<dyn OutputContext>> {
        Ok(Arc::new(DesktopOutput::open(format)?))
    }

    fn open_input(&self, format: AudioFormat) -> Result<Arc<dyn InputContext>> {
        Ok(Arc::new(DesktopInput::new(format)))
    }
}

/// Sample formats the streams convert from and to.
fn is_convertible(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

/// Check a device's default config for a usable sample format.
fn usable_config(kind: &str, config: SupportedStreamConfig) -> Result<SupportedStreamConfig> {
    if !is_convertible(config.sample_format()) {
        return Err(LiveError::device(format!(
            "default {kind} device uses unsupported {:?} samples",
            config.sample_format()
        )));
    }
    Ok(config)
}

/// Thread that owns a cpal stream until told to stop.
struct StreamThread {
    stop_tx: crossbeam_channel::Sender<()>,
    handle: std::thread::JoinHandle<()>,
}

impl StreamThread {
    /// Run `build` on a new thread and keep the stream it returns alive.
    ///
    /// Returns once the stream is playing, or with the error `build` failed with.
    fn spawn<F>(name: &str, build: F) -> Result<Self>
    where
        F: FnOnce() -> Result<cpal::Stream> + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let stream = match build() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Blocks until stop() or the sender is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| LiveError::device(format!("failed to spawn {name} thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { stop_tx, handle }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(LiveError::device(format!("{name} thread exited during startup"))),
        }
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            tracing::warn!("Audio stream thread panicked");
        }
    }
}
