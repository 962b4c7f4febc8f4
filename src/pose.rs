//! Pose-variant editor: one source image, eight fixed angle/pose variants.

use crate::config::GenerationConfig;
use crate::error::StudioError;
use crate::generation::{
    extract_image, CheckedReferences, FanOutCoordinator, ItemDescriptor, ItemPayload, ItemTask,
    ReferenceInputs, RunReport, RunState, TaskRunner, VideoPromptConfig, VideoPromptDocument,
};
use crate::provider::{ContentRequest, GenerationClient, GenerationSettings, ModelSet, Part};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Model named in the video prompt document attached to each variant.
pub const VARIANT_VIDEO_MODEL: &str = "veo-3.1-generate-preview";
pub const VARIANT_VIDEO_RESOLUTION: &str = "1080p";
pub const VARIANT_NEGATIVE_PROMPT: &str = "music, background music, singing, distorted anatomy, blurry, low resolution, watermark, text, signature, grainy, low quality, 3d render, cartoon, flicker, aspect ratio bars";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseVariant {
    pub angle: &'static str,
    pub pose: &'static str,
    pub camera_movement: &'static str,
}

pub const POSE_VARIANTS: [PoseVariant; 8] = [
    PoseVariant { angle: "Front View", pose: "Standing confidently", camera_movement: "Static" },
    PoseVariant { angle: "Right Profile", pose: "Walking motion", camera_movement: "Truck Left" },
    PoseVariant { angle: "Left Profile", pose: "Looking away", camera_movement: "Truck Right" },
    PoseVariant { angle: "Three-Quarter Left", pose: "Relaxed pose", camera_movement: "Slow Arc Right" },
    PoseVariant { angle: "Three-Quarter Right", pose: "Interacting with accessory", camera_movement: "Slow Arc Left" },
    PoseVariant { angle: "High Angle", pose: "Looking up", camera_movement: "Boom Down" },
    PoseVariant { angle: "Low Angle", pose: "Power pose", camera_movement: "Boom Up" },
    PoseVariant { angle: "Close-up Face", pose: "Engaging facial expression", camera_movement: "Slow Zoom In" },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariantParams {
    angle: String,
    pose: String,
    camera_movement: String,
}

/// Descriptors for the fixed catalog, ids 1..=8 in catalog order.
pub fn pose_descriptors() -> Result<Vec<ItemDescriptor>, serde_json::Error> {
    POSE_VARIANTS
        .iter()
        .zip(1u32..)
        .map(|(variant, id)| {
            ItemDescriptor::from_params(
                id,
                &VariantParams {
                    angle: variant.angle.to_string(),
                    pose: variant.pose.to_string(),
                    camera_movement: variant.camera_movement.to_string(),
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct PoseEditRequest {
    pub references: ReferenceInputs,
    /// Free-form instruction appended to every variant prompt
    pub instruction: Option<String>,
    pub aspect_ratio: String,
    pub selected_color: Option<String>,
}

pub struct PoseVariantTask<C> {
    client: Arc<C>,
    model: String,
    references: CheckedReferences,
    aspect_ratio: String,
    instruction: Option<String>,
    selected_color: Option<String>,
}

impl<C: GenerationClient> PoseVariantTask<C> {
    pub fn new(
        client: Arc<C>,
        model: impl Into<String>,
        references: CheckedReferences,
        request: &PoseEditRequest,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            references,
            aspect_ratio: request.aspect_ratio.clone(),
            instruction: request.instruction.clone().filter(|i| !i.trim().is_empty()),
            selected_color: request.selected_color.clone(),
        }
    }

    fn build_request(&self, params: &VariantParams) -> ContentRequest {
        let mut parts = vec![Part::image(&self.references.primary)];
        if let Some(face) = &self.references.face {
            parts.push(Part::image(face));
        }
        if let Some(background) = &self.references.background {
            parts.push(Part::image(background));
        }

        let mut prompt = format!(
            "Keep the product exactly as in the main image. Show the same subject in a new pose: {}. \
             Angle: {}. Color: {}. Ultra-realistic detail.",
            params.pose,
            params.angle,
            self.selected_color.as_deref().unwrap_or("original")
        );
        if let Some(instruction) = &self.instruction {
            prompt.push_str(&format!(" Instruction: {}.", instruction));
        }
        if self.references.face.is_some() {
            prompt.push_str(" Use the face from the reference image.");
        }
        parts.push(Part::text(prompt));

        ContentRequest::new(self.model.clone(), parts).with_settings(GenerationSettings {
            aspect_ratio: Some(self.aspect_ratio.clone()),
            ..GenerationSettings::default()
        })
    }

    fn video_prompt(&self, params: &VariantParams) -> VideoPromptDocument {
        VideoPromptDocument {
            model: VARIANT_VIDEO_MODEL.to_string(),
            prompt: format!(
                "Hyper-realistic fashion video. A professional model in {} performing a {} at a {}. \
                 Audio: natural spoken voiceover only, no music or singing. Cinematic shallow depth \
                 of field, detailed fabric textures. No distortions, no on-screen text.",
                self.selected_color.as_deref().unwrap_or("clothing"),
                params.pose,
                params.angle
            ),
            config: VideoPromptConfig {
                camera_movement: params.camera_movement.clone(),
                negative_prompt: VARIANT_NEGATIVE_PROMPT.to_string(),
                resolution: VARIANT_VIDEO_RESOLUTION.to_string(),
            },
        }
    }
}

#[async_trait]
impl<C: GenerationClient> ItemTask for PoseVariantTask<C> {
    async fn generate(&self, descriptor: &ItemDescriptor) -> Result<ItemPayload, StudioError> {
        let params: VariantParams = descriptor.params().map_err(|e| {
            StudioError::GenerationFailed(format!("variant {} parameters: {}", descriptor.id, e))
        })?;
        let response = self.client.generate_content(self.build_request(&params)).await?;
        let image = extract_image(&response)?;
        Ok(ItemPayload {
            image,
            video_prompt: Some(self.video_prompt(&params)),
        })
    }

    fn stage(&self) -> &'static str {
        "pose_variant"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoseEditRun {
    pub report: RunReport,
    pub state: Arc<RunState>,
    pub dropped_references: Vec<&'static str>,
}

pub struct PoseEditor<C> {
    client: Arc<C>,
    models: ModelSet,
    generation: GenerationConfig,
    coordinator: Arc<FanOutCoordinator>,
}

impl<C: GenerationClient + 'static> PoseEditor<C> {
    pub fn new(
        client: Arc<C>,
        models: ModelSet,
        generation: GenerationConfig,
        coordinator: Arc<FanOutCoordinator>,
    ) -> Self {
        Self {
            client,
            models,
            generation,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<FanOutCoordinator> {
        &self.coordinator
    }

    #[instrument(skip_all, fields(aspect_ratio = %request.aspect_ratio))]
    pub async fn run(&self, request: &PoseEditRequest) -> Result<PoseEditRun, StudioError> {
        let reset_id = self.coordinator.reset();
        let references = request.references.check(self.generation.reference_policy)?;
        let dropped_references = references.dropped.clone();
        let descriptors = pose_descriptors().map_err(|e| {
            StudioError::Preflight(format!("cannot build pose descriptors: {}", e))
        })?;

        let runner = TaskRunner::with_item_timeout(
            PoseVariantTask::new(
                Arc::clone(&self.client),
                self.models.image.clone(),
                references,
                request,
            ),
            self.generation.item_timeout(),
        );
        let report = self
            .coordinator
            .run_if_current(reset_id, descriptors, &runner)
            .await?;

        Ok(PoseEditRun {
            report,
            state: self.coordinator.snapshot(),
            dropped_references,
        })
    }
}
