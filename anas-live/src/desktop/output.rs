use super::resample::{CHUNK_FRAMES, StreamResampler};
use super::{StreamThread, usable_config};
use crate::audio::{AudioFormat, PlaybackSegment};
use crate::device::{OutputContext, SourceId};
use crate::error::{LiveError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Speech output on the default output device.
///
/// Sources are mixed at the call's rate and resampled to the device's. The
/// output clock counts mixed frames, so scheduled start times are sample
/// accurate on the call's timeline.
pub struct DesktopOutput {
    sample_rate: u32,
    mixer: Arc<Mutex<Mixer>>,
    stream: Mutex<Option<StreamThread>>,
}

impl DesktopOutput {
    /// Open the default output device for audio at `format`'s rate.
    pub fn open(format: AudioFormat) -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| LiveError::device("No output device available"))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let config = device
            .default_output_config()
            .map_err(|e| LiveError::device(format!("Failed to get default output config: {e}")))?;
        let config = usable_config("output", config)?;
        tracing::info!(
            device = %name,
            channels = config.channels(),
            sample_rate = config.sample_rate().0,
            sample_format = ?config.sample_format(),
            "Using output device"
        );

        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let render = mixer.clone();
        let call_rate = format.sample_rate;
        let stream = StreamThread::spawn("anas-playback", move || {
            let chain = RenderChain::new(render, call_rate, config.sample_rate().0)?;
            match config.sample_format() {
                SampleFormat::F32 => build_output_stream::<f32>(&config, chain),
                SampleFormat::I16 => build_output_stream::<i16>(&config, chain),
                SampleFormat::U16 => build_output_stream::<u16>(&config, chain),
                other => Err(LiveError::device(format!("Unsupported output sample format {other:?}"))),
            }
        })?;

        Ok(Self { sample_rate: call_rate, mixer, stream: Mutex::new(Some(stream)) })
    }
}

impl OutputContext for DesktopOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.mixer.lock().frames_rendered as f64 / self.sample_rate as f64
    }

    fn start_source(&self, segment: &PlaybackSegment, at: f64) -> Result<SourceId> {
        if segment.sample_rate != self.sample_rate {
            return Err(LiveError::device(format!(
                "segment at {} Hz cannot play on a {} Hz output",
                segment.sample_rate, self.sample_rate
            )));
        }
        let start_frame = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        Ok(self.mixer.lock().add(start_frame, segment.samples.clone()))
    }

    fn stop_source(&self, id: SourceId) -> Result<()> {
        self.mixer.lock().remove(id);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(stream) = self.stream.lock().take() {
            stream.stop();
            tracing::info!("Stopped audio playback");
        }
        self.mixer.lock().sources.clear();
        Ok(())
    }
}

impl Drop for DesktopOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn build_output_stream<T>(config: &SupportedStreamConfig, mut chain: RenderChain) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| LiveError::device("Output device disappeared"))?;

    let channels = config.channels() as usize;
    let stream = device
        .build_output_stream(
            &config.config(),
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                chain.render(data, channels);
            },
            |err| tracing::error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| LiveError::device(format!("Failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| LiveError::device(format!("Failed to start output stream: {e}")))?;
    Ok(stream)
}

/// Pulls mixed speech from the [`Mixer`] in fixed blocks and feeds the
/// device at its own rate and sample format.
struct RenderChain {
    mixer: Arc<Mutex<Mixer>>,
    resampler: StreamResampler,
    ready: VecDeque<f32>,
}

impl RenderChain {
    fn new(mixer: Arc<Mutex<Mixer>>, call_rate: u32, device_rate: u32) -> Result<Self> {
        Ok(Self {
            mixer,
            resampler: StreamResampler::new(call_rate, device_rate)?,
            ready: VecDeque::with_capacity(CHUNK_FRAMES * 4),
        })
    }

    fn render<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        let channels = channels.max(1);
        let frames = data.len() / channels;

        while self.ready.len() < frames {
            let mut block = [0.0f32; CHUNK_FRAMES];
            self.mixer.lock().render(&mut block);
            match self.resampler.process(&block) {
                Ok(samples) => self.ready.extend(samples),
                Err(e) => {
                    tracing::warn!(error = %e, "Resampling failed, playing silence");
                    self.ready.resize(frames, 0.0);
                }
            }
        }

        for frame in data.chunks_mut(channels) {
            let value = T::from_sample(self.ready.pop_front().unwrap_or(0.0));
            frame.fill(value);
        }
    }
}

struct MixSource {
    id: SourceId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl MixSource {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Sums scheduled sources into interleaved device buffers.
#[derive(Default)]
struct Mixer {
    frames_rendered: u64,
    next_id: SourceId,
    sources: Vec<MixSource>,
}

impl Mixer {
    fn add(&mut self, start_frame: u64, samples: Vec<f32>) -> SourceId {
        let id = self.next_id;
        self.next_id += 1;
        self.sources.push(MixSource { id, start_frame, samples });
        id
    }

    fn remove(&mut self, id: SourceId) {
        self.sources.retain(|s| s.id != id);
    }

    /// Mix the next `data.len()` mono frames.
    fn render(&mut self, data: &mut [f32]) {
        for (i, out) in data.iter_mut().enumerate() {
            let position = self.frames_rendered + i as u64;
            let mut value = 0.0f32;
            for source in &self.sources {
                if position >= source.start_frame && position < source.end_frame() {
                    value += source.samples[(position - source.start_frame) as usize];
                }
            }
            *out = value.clamp(-1.0, 1.0);
        }

        self.frames_rendered += data.len() as u64;
        let now = self.frames_rendered;
        self.sources.retain(|s| s.end_frame() > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixer_starts_sources_on_their_frame() {
        let mut mixer = Mixer::default();
        mixer.add(2, vec![0.5, 0.25]);

        let mut out = vec![9.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.5, 0.25]);
        assert_eq!(mixer.frames_rendered, 4);
        assert!(mixer.sources.is_empty());
    }

    #[test]
    fn test_mixer_back_to_back_sources_do_not_overlap() {
        let mut mixer = Mixer::default();
        mixer.add(0, vec![0.1, 0.1]);
        mixer.add(2, vec![0.2, 0.2]);

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_removed_source_is_silent() {
        let mut mixer = Mixer::default();
        let id = mixer.add(0, vec![0.5; 4]);
        mixer.remove(id);

        let mut out = vec![1.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn test_render_chain_fills_every_channel_in_device_format() {
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        mixer.lock().add(1, vec![0.5, -0.5]);
        let mut chain = RenderChain::new(mixer.clone(), 24_000, 24_000).unwrap();

        let mut out = [7i16; 8];
        chain.render(&mut out, 2);
        assert_eq!(out, [0, 0, 16_384, 16_384, -16_384, -16_384, 0, 0]);
        // Mixing runs one block ahead of the device.
        assert_eq!(mixer.lock().frames_rendered, CHUNK_FRAMES as u64);
    }

    #[test]
    fn test_render_chain_resamples_to_device_rate() {
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let mut chain = RenderChain::new(mixer.clone(), 24_000, 48_000).unwrap();

        // 100 ms of 48 kHz stereo.
        let mut out = vec![1.0f32; 9_600];
        chain.render(&mut out, 2);
        assert!(out.iter().all(|s| s.abs() < 1e-3));

        let mixed = mixer.lock().frames_rendered;
        assert!((2_400..2_400 + 2 * CHUNK_FRAMES as u64).contains(&mixed), "mixed {mixed}");
    }
}
