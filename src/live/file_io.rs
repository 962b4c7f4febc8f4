//! WAV-file backed capture and playback, for running sessions headless.

use crate::error::{MediaError, SessionError};
use crate::live::playback::ScheduledFrame;
use crate::live::session::{AudioCapture, PlaybackSink};
use crate::media::{encode_wav, pcm, read_wav, PcmFormat};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Streams a mono (or downmixed) 16-bit WAV file in fixed blocks, paced at
/// real time.
pub struct WavFileCapture {
    path: PathBuf,
    block_size: usize,
    samples: Vec<f32>,
    position: usize,
    pacing: Option<Interval>,
    realtime: bool,
}

impl WavFileCapture {
    pub fn new(path: impl Into<PathBuf>, block_size: usize) -> Self {
        Self {
            path: path.into(),
            block_size: block_size.max(1),
            samples: Vec::new(),
            position: 0,
            pacing: None,
            realtime: true,
        }
    }

    /// Deliver blocks as fast as they are requested.
    pub fn unpaced(mut self) -> Self {
        self.realtime = false;
        self
    }
}

#[async_trait]
impl AudioCapture for WavFileCapture {
    async fn open(&mut self) -> Result<u32, SessionError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            SessionError::CaptureUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let (header, interleaved) = read_wav(&bytes).map_err(|e| {
            SessionError::CaptureUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let channels = header.channels.max(1) as usize;
        self.samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().map(|&s| s as f32 / 32768.0).sum::<f32>() / channels as f32)
            .collect();
        self.position = 0;

        if self.realtime && header.sample_rate > 0 {
            let period = Duration::from_secs_f64(self.block_size as f64 / header.sample_rate as f64);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.pacing = Some(interval);
        }
        debug!(
            path = %self.path.display(),
            sample_rate = header.sample_rate,
            samples = self.samples.len(),
            "Capture file opened"
        );
        Ok(header.sample_rate)
    }

    async fn next_block(&mut self) -> Option<Vec<f32>> {
        if self.position >= self.samples.len() {
            return None;
        }
        if let Some(interval) = self.pacing.as_mut() {
            interval.tick().await;
        }
        let end = (self.position + self.block_size).min(self.samples.len());
        let block = self.samples[self.position..end].to_vec();
        self.position = end;
        Some(block)
    }

    fn close(&mut self) {
        self.pacing = None;
        self.samples = Vec::new();
    }
}

/// Renders scheduled frames onto a timeline that starts when the sink is
/// created, then writes it out as WAV.
pub struct WavFileSink {
    format: PcmFormat,
    epoch: Instant,
    timeline: Vec<i16>,
    frames: Vec<ScheduledFrame>,
    halted: usize,
}

impl WavFileSink {
    pub fn new(format: PcmFormat) -> Self {
        Self {
            format,
            epoch: Instant::now(),
            timeline: Vec::new(),
            frames: Vec::new(),
            halted: 0,
        }
    }

    fn sample_index(&self, at: Duration) -> usize {
        (at.as_secs_f64() * self.format.sample_rate as f64).round() as usize
    }

    pub fn frames(&self) -> &[ScheduledFrame] {
        &self.frames
    }

    /// Number of times scheduled audio was cut short.
    pub fn halted(&self) -> usize {
        self.halted
    }

    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.timeline.len() * self.format.bytes_per_frame())
    }

    /// Everything played so far, leading silence included.
    pub fn to_wav(&self) -> Result<Vec<u8>, MediaError> {
        encode_wav(&pcm::to_le_bytes(&self.timeline), self.format)
    }
}

impl PlaybackSink for WavFileSink {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn play(&mut self, frame: ScheduledFrame, samples: Vec<i16>) -> Result<(), SessionError> {
        let start = self.sample_index(frame.start);
        let end = start + samples.len();
        if self.timeline.len() < end {
            self.timeline.resize(end, 0);
        }
        self.timeline[start..end].copy_from_slice(&samples);
        self.frames.push(frame);
        Ok(())
    }

    fn stop_all(&mut self) {
        let cut = self.sample_index(self.now());
        if self.timeline.len() > cut {
            self.timeline.truncate(cut);
            self.halted += 1;
        }
    }
}
