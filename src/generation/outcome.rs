use crate::media::DataUri;
use crate::types::ItemId;
use serde::{Deserialize, Serialize};

/// Video prompt document attached to pose-variant results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPromptDocument {
    pub model: String,
    pub prompt: String,
    pub config: VideoPromptConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPromptConfig {
    pub camera_movement: String,
    pub negative_prompt: String,
    pub resolution: String,
}

/// Successful item result. The image is always a canonical data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPayload {
    pub image: DataUri,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_prompt: Option<VideoPromptDocument>,
}

impl ItemPayload {
    pub fn image(image: DataUri) -> Self {
        Self {
            image,
            video_prompt: None,
        }
    }
}

/// Result of running one descriptor; produced exactly once per descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success { id: ItemId, payload: ItemPayload },
    Failure { id: ItemId, reason: String },
}

impl GenerationOutcome {
    pub fn id(&self) -> ItemId {
        match self {
            GenerationOutcome::Success { id, .. } | GenerationOutcome::Failure { id, .. } => *id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success { .. })
    }
}
