//! Long-running video generation: start, poll until done, download.

use crate::config::VideoConfig;
use crate::error::StudioError;
use crate::media::DataUri;
use crate::provider::{VideoClient, VideoRequest};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Aspect ratios the video collaborator accepts.
pub const VIDEO_ASPECT_RATIOS: [&str; 2] = ["9:16", "16:9"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&VideoConfig> for PollPolicy {
    fn from(config: &VideoConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub operation: String,
    pub uri: String,
    pub bytes: Vec<u8>,
    pub polls: u32,
}

/// Build a request, rejecting aspect ratios the video model does not support.
pub fn video_request(
    model: &str,
    prompt: &str,
    image: DataUri,
    aspect_ratio: &str,
    resolution: &str,
) -> Result<VideoRequest, StudioError> {
    if !VIDEO_ASPECT_RATIOS.contains(&aspect_ratio) {
        return Err(StudioError::Preflight(format!(
            "video aspect ratio must be one of {:?}, got '{}'",
            VIDEO_ASPECT_RATIOS, aspect_ratio
        )));
    }
    if prompt.trim().is_empty() {
        return Err(StudioError::Preflight("video prompt is empty".to_string()));
    }
    Ok(VideoRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        image: Some(image),
        aspect_ratio: aspect_ratio.to_string(),
        resolution: resolution.to_string(),
    })
}

#[instrument(skip_all, fields(model = %request.model, aspect_ratio = %request.aspect_ratio))]
pub async fn generate_video<C: VideoClient + ?Sized>(
    client: &C,
    request: VideoRequest,
    policy: PollPolicy,
) -> Result<GeneratedVideo, StudioError> {
    let deadline = Instant::now() + policy.timeout;
    let mut operation = client.start_video(request).await?;
    info!(operation = %operation.name, "Video operation started");

    let mut polls = 0u32;
    while !operation.done {
        if Instant::now() + policy.interval > deadline {
            return Err(StudioError::Timeout(format!(
                "video operation {} not done after {}s",
                operation.name,
                policy.timeout.as_secs()
            )));
        }
        tokio::time::sleep(policy.interval).await;
        operation = client.poll_video(&operation).await?;
        polls += 1;
        debug!(operation = %operation.name, polls, done = operation.done, "Polled video operation");
    }

    if let Some(error) = operation.error {
        return Err(StudioError::GenerationFailed(format!(
            "video operation {} failed: {}",
            operation.name, error
        )));
    }
    let uri = operation.video_uri.ok_or_else(|| {
        StudioError::EmptyResponse(format!("video operation {} returned no link", operation.name))
    })?;
    let bytes = client.download(&uri).await?;
    info!(bytes = bytes.len(), polls, "Video downloaded");

    Ok(GeneratedVideo {
        operation: operation.name,
        uri,
        bytes,
        polls,
    })
}
