//! Speech and video result presentation.

use super::to_pretty_json;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct SpeechSummary {
    pub path: PathBuf,
    pub voice: String,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub path: PathBuf,
    pub operation: String,
    pub polls: u32,
    pub bytes: usize,
}

pub fn format_speech_result(summary: &SpeechSummary, format: &str) -> String {
    if format == "json" {
        return to_pretty_json(summary);
    }
    format!(
        "Speech written: {}\n  Voice: {}\n  Duration: {:.2}s at {} Hz\n  Size: {} bytes",
        summary.path.display(),
        summary.voice,
        summary.duration_secs,
        summary.sample_rate,
        summary.bytes
    )
}

pub fn format_video_result(summary: &VideoSummary, format: &str) -> String {
    if format == "json" {
        return to_pretty_json(summary);
    }
    format!(
        "Video written: {}\n  Operation: {}\n  Polls: {}\n  Size: {} bytes",
        summary.path.display(),
        summary.operation,
        summary.polls,
        summary.bytes
    )
}
