//! Generation Collaborator Abstraction
//!
//! The hosted generative API is an opaque collaborator: callers build a
//! [`ContentRequest`], the client submits it and hands back a typed
//! [`ContentResponse`] or a [`StudioError`]. Request fields such as aspect ratios and
//! voice names are passed through unchanged.

use crate::error::StudioError;
use crate::media::DataUri;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub mod gemini;

pub use gemini::GeminiClient;

/// One element of a multimodal request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(image: &DataUri) -> Self {
        Part::InlineData {
            mime_type: image.mime_type().to_string(),
            data: image.data().to_string(),
        }
    }
}

/// Output modality requested from the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

/// Pass-through generation settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSettings {
    /// JSON schema constraining a structured text response
    pub response_schema: Option<Value>,
    pub aspect_ratio: Option<String>,
    pub response_modalities: Vec<Modality>,
    pub voice: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub model: String,
    pub parts: Vec<Part>,
    pub system_instruction: Option<String>,
    pub settings: GenerationSettings,
}

impl ContentRequest {
    pub fn new(model: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            model: model.into(),
            parts,
            system_instruction: None,
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub parts: Vec<Part>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentResponse {
    pub candidates: Vec<Candidate>,
    /// Set when the prompt was refused before generation
    pub block_reason: Option<String>,
}

impl ContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// First inline payload of the first candidate as `(mime_type, base64)`.
    pub fn inline_data(&self) -> Option<(&str, &str)> {
        self.candidates.first()?.parts.iter().find_map(|p| match p {
            Part::InlineData { mime_type, data } => Some((mime_type.as_str(), data.as_str())),
            Part::Text(_) => None,
        })
    }

    /// Explain an empty response in terms of block or finish reason.
    pub fn describe_empty(&self) -> String {
        if let Some(reason) = &self.block_reason {
            return format!("prompt blocked ({})", reason);
        }
        match self.candidates.first() {
            None => "no candidates returned".to_string(),
            Some(c) => match &c.finish_reason {
                Some(reason) => format!("no usable content (finish reason {})", reason),
                None => "no usable content".to_string(),
            },
        }
    }
}

/// Generation collaborator: one request in, one typed result or failure out.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate_content(&self, request: ContentRequest)
        -> Result<ContentResponse, StudioError>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<DataUri>,
    pub aspect_ratio: String,
    pub resolution: String,
}

/// State of a long-running video operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOperation {
    pub name: String,
    pub done: bool,
    pub video_uri: Option<String>,
    pub error: Option<String>,
}

/// Long-running video collaborator.
#[async_trait]
pub trait VideoClient: Send + Sync {
    async fn start_video(&self, request: VideoRequest) -> Result<VideoOperation, StudioError>;

    async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoOperation, StudioError>;

    async fn download(&self, uri: &str) -> Result<Vec<u8>, StudioError>;
}

/// Model names per generation concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSet {
    #[serde(default = "default_analysis_model")]
    pub analysis: String,
    #[serde(default = "default_plan_model")]
    pub plan: String,
    #[serde(default = "default_image_model")]
    pub image: String,
    #[serde(default = "default_speech_model")]
    pub speech: String,
    #[serde(default = "default_video_model")]
    pub video: String,
    #[serde(default = "default_live_model")]
    pub live: String,
}

fn default_analysis_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_plan_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_speech_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_video_model() -> String {
    "veo-3.1-fast-generate-preview".to_string()
}

fn default_live_model() -> String {
    "gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            analysis: default_analysis_model(),
            plan: default_plan_model(),
            image: default_image_model(),
            speech: default_speech_model(),
            video: default_video_model(),
            live: default_live_model(),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// REST base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Websocket URL of the bidirectional live endpoint
    #[serde(default = "default_live_endpoint")]
    pub live_endpoint: String,

    /// API key; falls back to GEMINI_API_KEY / API_KEY
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub models: ModelSet,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_live_endpoint() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            live_endpoint: default_live_endpoint(),
            api_key: None,
            models: ModelSet::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), String> {
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| format!("Invalid endpoint '{}': {}", self.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(format!("Endpoint must be http(s): {}", self.endpoint));
        }
        let live = url::Url::parse(&self.live_endpoint)
            .map_err(|e| format!("Invalid live endpoint '{}': {}", self.live_endpoint, e))?;
        if !matches!(live.scheme(), "ws" | "wss") {
            return Err(format!(
                "Live endpoint must be ws(s): {}",
                self.live_endpoint
            ));
        }
        let models = [
            ("analysis", &self.models.analysis),
            ("plan", &self.models.plan),
            ("image", &self.models.image),
            ("speech", &self.models.speech),
            ("video", &self.models.video),
            ("live", &self.models.live),
        ];
        for (concern, model) in models {
            if model.trim().is_empty() {
                return Err(format!("Model for '{}' cannot be empty", concern));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be positive".to_string());
        }
        Ok(())
    }

    /// API key or a preflight error naming where to set it.
    pub fn require_api_key(&self) -> Result<&str, StudioError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                StudioError::ProviderNotConfigured(
                    "No API key. Set provider.api_key, SHOTLIST__PROVIDER__API_KEY or GEMINI_API_KEY."
                        .to_string(),
                )
            })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
