//! Audio formats and the PCM codec.
//!
//! Captured audio is `f32` in `[-1, 1]`; the wire carries 16-bit
//! little-endian PCM wrapped in base64 text.

use crate::error::{LiveError, Result};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Microphone sample rate expected by the live endpoint.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of synthesized speech returned by the live endpoint.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Samples per captured frame.
pub const DEFAULT_FRAME_SAMPLES: usize = 4096;

/// Mono 16-bit PCM format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 24000, 16000).
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono).
    pub channels: u8,
    /// Bits per sample.
    pub bits_per_sample: u8,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16_24khz()
    }
}

impl AudioFormat {
    /// Create a new audio format specification.
    pub fn new(sample_rate: u32, channels: u8, bits_per_sample: u8) -> Self {
        Self { sample_rate, channels, bits_per_sample }
    }

    /// PCM16 mono at 24kHz (speech output).
    pub fn pcm16_24khz() -> Self {
        Self::new(OUTPUT_SAMPLE_RATE, 1, 16)
    }

    /// PCM16 mono at 16kHz (microphone input).
    pub fn pcm16_16khz() -> Self {
        Self::new(INPUT_SAMPLE_RATE, 1, 16)
    }

    /// Calculate bytes per second for this format.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample / 8) as u32
    }

    /// Calculate duration in milliseconds for a given number of bytes.
    pub fn duration_ms(&self, bytes: usize) -> f64 {
        let bytes_per_ms = self.bytes_per_second() as f64 / 1000.0;
        bytes as f64 / bytes_per_ms
    }

    /// MIME type announced on the wire, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Convert float samples to 16-bit little-endian PCM.
///
/// Samples are clamped to `[-1, 1]`. Negative values scale by 2^15 and
/// non-negative values by 2^15 - 1 so neither end overflows; the product is
/// rounded to the nearest integer.
pub fn encode_frame(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
        data.extend_from_slice(&(scaled.round() as i16).to_le_bytes());
    }
    data
}

/// Decode 16-bit little-endian PCM into a playback segment.
///
/// Each sample is divided by 2^15. Fails with [`LiveError::MalformedAudio`]
/// when the byte length is odd or the sample rate is zero.
pub fn decode_buffer(bytes: &[u8], sample_rate: u32) -> Result<PlaybackSegment> {
    if bytes.len() % 2 != 0 {
        return Err(LiveError::malformed(format!(
            "Invalid data length for PCM16: {} (must be even)",
            bytes.len()
        )));
    }
    if sample_rate == 0 {
        return Err(LiveError::malformed("sample rate must be non-zero"));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(PlaybackSegment { seq: 0, samples, sample_rate })
}

/// Encode binary audio as transport-safe text (standard base64).
pub fn to_transport_text(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode transport text produced by [`to_transport_text`].
pub fn from_transport_text(text: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| LiveError::malformed(format!("invalid base64 payload: {e}")))
}

/// One captured frame after PCM encoding, ready for the transport.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// PCM16 little-endian bytes.
    pub data: Bytes,
    /// Format of `data`.
    pub format: AudioFormat,
}

impl EncodedFrame {
    /// Encode float samples captured in `format`.
    pub fn encode(samples: &[f32], format: AudioFormat) -> Self {
        Self { data: Bytes::from(encode_frame(samples)), format }
    }

    /// Get duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.format.duration_ms(self.data.len())
    }

    /// Base64 text of the PCM payload.
    pub fn to_transport_text(&self) -> String {
        to_transport_text(&self.data)
    }
}

/// A decoded block of speech, tagged with its arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSegment {
    /// Arrival sequence number within the call.
    pub seq: u64,
    /// Mono samples in `[-1, 1)`.
    pub samples: Vec<f32>,
    /// Sample rate of `samples`.
    pub sample_rate: u32,
}

impl PlaybackSegment {
    /// Create a segment from already decoded samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { seq: 0, samples, sample_rate }
    }

    /// Tag the segment with its arrival order.
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Whether the segment has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
