use crate::error::{LiveError, Result};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

/// Input frames per resampler call.
pub(super) const CHUNK_FRAMES: usize = 512;

/// Mono sample-rate converter for a continuous stream.
///
/// Keeps one resampler for the life of the stream and buffers partial
/// chunks between calls, so device buffers of any size can be pushed.
/// Equal rates pass samples through untouched.
pub(super) struct StreamResampler {
    resampler: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub(super) fn new(from_rate: u32, to_rate: u32) -> Result<Self> {
        if from_rate == 0 || to_rate == 0 {
            return Err(LiveError::device("sample rates must be greater than 0"));
        }
        if from_rate == to_rate {
            return Ok(Self { resampler: None, pending: Vec::new() });
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler =
            SincFixedIn::<f32>::new(to_rate as f64 / from_rate as f64, 2.0, params, CHUNK_FRAMES, 1)
                .map_err(|e| LiveError::device(format!("Failed to create resampler: {e}")))?;

        tracing::info!(from_rate, to_rate, "Resampling audio");
        Ok(Self { resampler: Some(resampler), pending: Vec::with_capacity(CHUNK_FRAMES * 2) })
    }

    /// Convert `samples`, returning whatever output the buffered input allows.
    pub(super) fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.pending.extend_from_slice(samples);
        let mut output = Vec::new();
        while self.pending.len() >= CHUNK_FRAMES {
            let chunk: Vec<f32> = self.pending.drain(..CHUNK_FRAMES).collect();
            let waves_in = vec![chunk];
            let waves_out = resampler
                .process(&waves_in, None)
                .map_err(|e| LiveError::device(format!("Resampling failed: {e}")))?;
            if let Some(wave) = waves_out.into_iter().next() {
                output.extend(wave);
            }
        }
        Ok(output)
    }
}
