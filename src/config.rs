//! Configuration System
//!
//! Layered runtime configuration: built-in defaults, the global config file, workspace
//! config files, then `SHOTLIST__`-prefixed environment variables. Each section is
//! validated independently so every problem is reported at once.

use crate::error::StudioError;
use crate::generation::ReferencePolicy;
use crate::logging::{validate_logging_config, LoggingConfig};
use crate::media::PcmFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use crate::provider::{ModelSet, ProviderConfig};

mod merge_policy;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Generation collaborator endpoint, credentials and model names
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Fan-out behavior
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Realtime audio session formats
    #[serde(default)]
    pub audio: AudioConfig,

    /// Long-running video generation
    #[serde(default)]
    pub video: VideoConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// What to do when a secondary reference image is supplied but unusable
    #[serde(default)]
    pub reference_policy: ReferencePolicy,

    /// Per-item deadline; an item exceeding it settles as Failed
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: Option<u64>,
}

fn default_item_timeout_secs() -> Option<u64> {
    Some(180)
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            reference_policy: ReferencePolicy::default(),
            item_timeout_secs: default_item_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Uplink sample rate sent to the live collaborator
    #[serde(default = "default_input_rate")]
    pub input_sample_rate: u32,

    /// Sample rate of audio produced by the collaborator
    #[serde(default = "default_output_rate")]
    pub output_sample_rate: u32,

    /// Samples per uplink frame
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    /// Prebuilt voice name
    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_input_rate() -> u32 {
    16_000
}

fn default_output_rate() -> u32 {
    24_000
}

fn default_frame_size() -> usize {
    4096
}

pub(crate) fn default_voice() -> String {
    "Zephyr".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: default_input_rate(),
            output_sample_rate: default_output_rate(),
            frame_size: default_frame_size(),
            voice: default_voice(),
        }
    }
}

impl AudioConfig {
    pub fn input_format(&self) -> PcmFormat {
        PcmFormat::mono16(self.input_sample_rate)
    }

    pub fn output_format(&self) -> PcmFormat {
        PcmFormat::mono16(self.output_sample_rate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Overall deadline for one video operation
    #[serde(default = "default_video_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_resolution")]
    pub resolution: String,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_video_timeout_secs() -> u64 {
    600
}

fn default_resolution() -> String {
    "720p".to_string()
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_video_timeout_secs(),
            resolution: default_resolution(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Generation(String),
    Audio(String),
    Video(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "provider: {}", msg),
            ValidationError::Generation(msg) => write!(f, "generation: {}", msg),
            ValidationError::Audio(msg) => write!(f, "audio: {}", msg),
            ValidationError::Video(msg) => write!(f, "video: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return Err("Sample rates must be non-zero".to_string());
        }
        if self.frame_size == 0 {
            return Err("Frame size must be non-zero".to_string());
        }
        if self.voice.trim().is_empty() {
            return Err("Voice cannot be empty".to_string());
        }
        Ok(())
    }
}

impl VideoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("Poll interval must be at least one second".to_string());
        }
        if self.timeout_secs < self.poll_interval_secs {
            return Err(format!(
                "Timeout ({}s) is shorter than the poll interval ({}s)",
                self.timeout_secs, self.poll_interval_secs
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StudioConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if self.generation.item_timeout_secs == Some(0) {
            errors.push(ValidationError::Generation(
                "item_timeout_secs must be positive when set".to_string(),
            ));
        }
        if let Err(e) = self.audio.validate() {
            errors.push(ValidationError::Audio(e));
        }
        if let Err(e) = self.video.validate() {
            errors.push(ValidationError::Video(e));
        }
        if let Err(e) = validate_logging_config(&self.logging) {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all problems into one error.
    pub fn validated(self) -> Result<Self, StudioError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            StudioError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

/// Loads `StudioConfig` from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    pub fn load(workspace_root: &Path) -> Result<StudioConfig, StudioError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(Self::environment());
        let config: StudioConfig = builder.build()?.try_deserialize()?;
        Ok(Self::apply_key_fallback(config))
    }

    /// Load from one explicit file plus environment overrides.
    pub fn load_from_file(path: &Path) -> Result<StudioConfig, StudioError> {
        if !path.exists() {
            return Err(StudioError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path))
            .add_source(Self::environment());
        let config: StudioConfig = builder.build()?.try_deserialize()?;
        Ok(Self::apply_key_fallback(config))
    }

    pub fn default() -> StudioConfig {
        StudioConfig::default()
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("SHOTLIST")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    /// The API key may come from the conventional collaborator variables.
    fn apply_key_fallback(mut config: StudioConfig) -> StudioConfig {
        if config.provider.api_key.is_none() {
            config.provider.api_key = ["GEMINI_API_KEY", "API_KEY"]
                .iter()
                .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
        }
        config
    }
}
