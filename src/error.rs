//! Error types for the shotlist orchestration layer.

use thiserror::Error;

/// Media encoding errors (data URIs, PCM, WAV containers)
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Invalid PCM buffer: {0}")]
    InvalidPcm(String),

    #[error("WAV container error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Realtime audio session errors. Every variant terminates the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Microphone unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed by peer: {0}")]
    ClosedByPeer(String),

    #[error("Playback error: {0}")]
    Playback(String),
}

/// Library-wide error type
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Empty response from provider: {0}")]
    EmptyResponse(String),

    #[error("Malformed response from provider: {0}")]
    MalformedResponse(String),

    #[error("Preflight failed: {0}")]
    Preflight(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Request superseded by newer {0}")]
    Superseded(crate::types::RunId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for StudioError {
    fn from(err: config::ConfigError) -> Self {
        StudioError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        StudioError::MalformedResponse(err.to_string())
    }
}

impl From<hound::Error> for StudioError {
    fn from(err: hound::Error) -> Self {
        StudioError::Media(MediaError::Wav(err))
    }
}

impl StudioError {
    /// Errors raised before any fan-out item is dispatched.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            StudioError::Preflight(_)
                | StudioError::ProviderNotConfigured(_)
                | StudioError::ProviderAuthFailed(_)
        )
    }
}
