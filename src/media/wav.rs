//! RIFF/WAVE container for downloadable PCM output.

use crate::error::MediaError;
use crate::media::pcm::{self, PcmFormat};
use serde::Serialize;
use std::io::Cursor;

/// Header fields of a parsed WAV container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Number of sample frames in the data chunk
    pub frames: u32,
}

impl WavHeader {
    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }
}

/// Wrap raw little-endian 16-bit PCM in a WAV container.
pub fn encode_wav(pcm_bytes: &[u8], format: PcmFormat) -> Result<Vec<u8>, MediaError> {
    if format.bits_per_sample != 16 {
        return Err(MediaError::UnsupportedFormat(format!(
            "{}-bit PCM (only 16-bit is supported)",
            format.bits_per_sample
        )));
    }
    if format.channels == 0 || format.sample_rate == 0 {
        return Err(MediaError::UnsupportedFormat(
            "channels and sample rate must be non-zero".to_string(),
        ));
    }
    let samples = pcm::from_le_bytes(pcm_bytes)?;
    if samples.len() % format.channels as usize != 0 {
        return Err(MediaError::InvalidPcm(format!(
            "{} samples do not divide into {} channels",
            samples.len(),
            format.channels
        )));
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm_bytes.len()));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn read_wav_header(bytes: &[u8]) -> Result<WavHeader, MediaError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    Ok(WavHeader {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Read a 16-bit integer WAV into its header and interleaved samples.
pub fn read_wav(bytes: &[u8]) -> Result<(WavHeader, Vec<i16>), MediaError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(MediaError::UnsupportedFormat(format!(
            "{}-bit {:?} samples",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    let header = WavHeader {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    };
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok((header, samples))
}
