//! Uplink framing: fixed-size frames, resampled and quantized for the wire.

use crate::media::{pcm, PcmFormat};
use serde::{Deserialize, Serialize};

/// Accumulates captured samples and yields complete frames of `frame_size`.
#[derive(Debug, Clone)]
pub struct FrameSlicer {
    frame_size: usize,
    buffer: Vec<f32>,
}

impl FrameSlicer {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size: frame_size.max(1),
            buffer: Vec::with_capacity(frame_size),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Append samples; returns every frame completed by them, oldest first.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.buffer.extend_from_slice(samples);
        let complete = self.buffer.len() / self.frame_size;
        if complete == 0 {
            return Vec::new();
        }
        let rest = self.buffer.split_off(complete * self.frame_size);
        let frames = self
            .buffer
            .chunks_exact(self.frame_size)
            .map(<[f32]>::to_vec)
            .collect();
        self.buffer = rest;
        frames
    }

    /// Samples waiting for a full frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the partial frame. Partial frames are never flushed upstream.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}

/// One encoded uplink frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UplinkChunk {
    pub mime_type: String,
    /// Base64 of 16-bit little-endian PCM
    pub data: String,
    /// RMS level of the frame before quantization
    #[serde(skip)]
    pub level: f32,
}

/// Converts captured frames to the uplink wire format.
#[derive(Debug, Clone, Copy)]
pub struct UplinkEncoder {
    capture_rate: u32,
    format: PcmFormat,
}

impl UplinkEncoder {
    pub fn new(capture_rate: u32, format: PcmFormat) -> Self {
        Self {
            capture_rate,
            format,
        }
    }

    pub fn encode(&self, frame: &[f32]) -> UplinkChunk {
        let resampled = pcm::resample_linear(frame, self.capture_rate, self.format.sample_rate);
        UplinkChunk {
            mime_type: self.format.mime_type(),
            data: pcm::encode_frame(&resampled),
            level: pcm::rms(frame),
        }
    }
}
