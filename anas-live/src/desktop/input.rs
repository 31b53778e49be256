use super::resample::StreamResampler;
use super::{StreamThread, usable_config};
use crate::audio::AudioFormat;
use crate::device::{FrameSink, InputContext, Microphone};
use crate::error::{LiveError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;

/// Capture context on the default input device.
#[derive(Debug)]
pub struct DesktopInput {
    format: AudioFormat,
}

impl DesktopInput {
    /// Create an input context for `format`.
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

impl InputContext for DesktopInput {
    fn acquire_microphone(&self) -> Result<Box<dyn Microphone>> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| LiveError::device("No input device available"))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let config = device
            .default_input_config()
            .map_err(|e| LiveError::device(format!("Failed to get default input config: {e}")))?;
        let config = usable_config("input", config)?;

        tracing::info!(
            device = %name,
            channels = config.channels(),
            sample_rate = config.sample_rate().0,
            sample_format = ?config.sample_format(),
            "Using input device"
        );
        Ok(Box::new(DesktopMicrophone {
            config,
            target_rate: self.format.sample_rate,
            stream: Mutex::new(None),
        }))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// The default microphone, streaming once started.
pub struct DesktopMicrophone {
    config: SupportedStreamConfig,
    target_rate: u32,
    stream: Mutex<Option<StreamThread>>,
}

impl Microphone for DesktopMicrophone {
    fn start(&self, frame_samples: usize, sink: Arc<dyn FrameSink>) -> Result<()> {
        let mut stream = self.stream.lock();
        if stream.is_some() {
            tracing::warn!("Already recording");
            return Ok(());
        }

        let config = self.config.clone();
        let target_rate = self.target_rate;
        *stream = Some(StreamThread::spawn("anas-capture", move || {
            let chain = CaptureChain::new(
                config.channels() as usize,
                config.sample_rate().0,
                target_rate,
                frame_samples,
            )?;
            match config.sample_format() {
                SampleFormat::F32 => build_input_stream::<f32>(&config, chain, sink),
                SampleFormat::I16 => build_input_stream::<i16>(&config, chain, sink),
                SampleFormat::U16 => build_input_stream::<u16>(&config, chain, sink),
                other => Err(LiveError::device(format!("Unsupported input sample format {other:?}"))),
            }
        })?);

        tracing::info!(frame_samples, "Started audio capture");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(stream) = self.stream.lock().take() {
            stream.stop();
            tracing::info!("Stopped audio capture");
        }
        Ok(())
    }
}

impl Drop for DesktopMicrophone {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn build_input_stream<T>(
    config: &SupportedStreamConfig,
    mut chain: CaptureChain,
    sink: Arc<dyn FrameSink>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| LiveError::device("Input device disappeared"))?;

    let stream = device
        .build_input_stream(
            &config.config(),
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                chain.push(data, |frame| sink.on_frame(frame));
            },
            |err| tracing::error!("Audio input stream error: {}", err),
            None,
        )
        .map_err(|e| LiveError::device(format!("Failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| LiveError::device(format!("Failed to start input stream: {e}")))?;
    Ok(stream)
}

/// Device buffers in, fixed-size mono frames at the call rate out.
struct CaptureChain {
    channels: usize,
    resampler: StreamResampler,
    framer: Framer,
}

impl CaptureChain {
    fn new(channels: usize, device_rate: u32, target_rate: u32, frame_samples: usize) -> Result<Self> {
        Ok(Self {
            channels,
            resampler: StreamResampler::new(device_rate, target_rate)?,
            framer: Framer::new(frame_samples),
        })
    }

    fn push<T>(&mut self, data: &[T], emit: impl FnMut(&[f32]))
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let mono = downmix(data, self.channels);
        match self.resampler.process(&mono) {
            Ok(samples) => self.framer.push(&samples, emit),
            Err(e) => tracing::warn!(error = %e, "Dropping captured audio"),
        }
    }
}

/// Convert interleaved device samples to `f32` and average them into mono.
fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    data.chunks(channels)
        .map(|frame| frame.iter().map(|s| f32::from_sample(*s)).sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Regroups device buffers of arbitrary size into fixed-size frames.
struct Framer {
    frame_samples: usize,
    buffer: Vec<f32>,
}

impl Framer {
    fn new(frame_samples: usize) -> Self {
        let frame_samples = frame_samples.max(1);
        Self { frame_samples, buffer: Vec::with_capacity(frame_samples) }
    }

    fn push(&mut self, samples: &[f32], mut emit: impl FnMut(&[f32])) {
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (self.frame_samples - self.buffer.len()).min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.buffer.len() == self.frame_samples {
                emit(&self.buffer);
                self.buffer.clear();
            }
        }
    }
}
