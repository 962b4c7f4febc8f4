//! 16-bit signed little-endian PCM framing.

use crate::error::MediaError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw PCM stream layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Microphone uplink format expected by the live collaborator.
    pub const INPUT_16K_MONO: PcmFormat = PcmFormat::mono16(16_000);

    /// Speech output format produced by the collaborator.
    pub const OUTPUT_24K_MONO: PcmFormat = PcmFormat::mono16(24_000);

    pub const fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Playback duration of `byte_len` bytes in this format.
    pub fn duration_of(&self, byte_len: usize) -> Duration {
        let frame_bytes = self.bytes_per_frame();
        if frame_bytes == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = byte_len / frame_bytes;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Mime type advertised on uplink chunks, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Quantize float samples in [-1.0, 1.0] to i16. Out-of-range input saturates.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| {
            let clamped = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
            (clamped * 32768.0) as i16
        })
        .collect()
}

pub fn dequantize(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn from_le_bytes(bytes: &[u8]) -> Result<Vec<i16>, MediaError> {
    if bytes.len() % 2 != 0 {
        return Err(MediaError::InvalidPcm(format!(
            "odd byte length {} for 16-bit samples",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Linear resampling between sample rates.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            if idx >= last {
                return samples[last];
            }
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[idx + 1] - samples[idx]) * frac
        })
        .collect()
}

/// Quantize one captured frame and base64 it for the uplink.
pub fn encode_frame(samples: &[f32]) -> String {
    STANDARD.encode(to_le_bytes(&quantize(samples)))
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, MediaError> {
    Ok(STANDARD.decode(data)?)
}

/// Root-mean-square level of a frame, used for input metering.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}
