//! Storyboard campaign: product analysis, the structured plan, and the 12-shot
//! image fan-out.

use crate::config::GenerationConfig;
use crate::error::StudioError;
use crate::generation::{
    extract_image, CheckedReferences, FanOutCoordinator, ItemDescriptor, ItemPayload, ItemTask,
    ReferenceInputs, RunReport, RunState, TaskRunner,
};
use crate::provider::{ContentRequest, GenerationClient, GenerationSettings, ModelSet, Part};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

/// Number of shots requested from the planner.
pub const SHOT_COUNT: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
    Square,
}

impl Orientation {
    pub fn aspect_ratio(self) -> &'static str {
        match self {
            Orientation::Portrait => "9:16",
            Orientation::Landscape => "16:9",
            Orientation::Square => "1:1",
        }
    }
}

impl FromStr for Orientation {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" | "9:16" => Ok(Orientation::Portrait),
            "landscape" | "16:9" => Ok(Orientation::Landscape),
            "square" | "1:1" => Ok(Orientation::Square),
            other => Err(StudioError::ConfigError(format!(
                "Unknown orientation '{}' (portrait, landscape, square)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    #[default]
    BahasaIndonesia,
    English,
    BahasaMalaysia,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::BahasaIndonesia => "Bahasa Indonesia",
            Language::English => "English",
            Language::BahasaMalaysia => "Bahasa Malaysia",
        };
        f.write_str(name)
    }
}

impl FromStr for Language {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "id" | "bahasa-indonesia" | "indonesian" => Ok(Language::BahasaIndonesia),
            "en" | "english" => Ok(Language::English),
            "ms" | "bahasa-malaysia" | "malay" => Ok(Language::BahasaMalaysia),
            other => Err(StudioError::ConfigError(format!(
                "Unknown language '{}' (id, en, ms)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGenerationPrompt {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub camera_movement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryboardShot {
    pub shot_number: u32,
    pub title: String,
    /// Scene description used to generate the still image
    pub visual_description: String,
    pub voiceover_text: String,
    pub video_generation_prompt: VideoGenerationPrompt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoData {
    pub title: String,
    pub description: String,
    pub hashtags: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryboardCampaign {
    pub shots: Vec<StoryboardShot>,
    pub seo: SeoData,
    pub tts_instructions: String,
}

impl StoryboardCampaign {
    /// Shots must be non-empty with unique shot numbers.
    pub fn validate(&self) -> Result<(), StudioError> {
        if self.shots.is_empty() {
            return Err(StudioError::MalformedResponse(
                "campaign plan contains no shots".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for shot in &self.shots {
            if !seen.insert(shot.shot_number) {
                return Err(StudioError::MalformedResponse(format!(
                    "campaign plan repeats shot number {}",
                    shot.shot_number
                )));
            }
        }
        Ok(())
    }

    /// Narration of every shot in shot order, one paragraph per shot.
    pub fn voiceover_script(&self) -> String {
        let mut shots: Vec<&StoryboardShot> = self.shots.iter().collect();
        shots.sort_by_key(|s| s.shot_number);
        shots
            .iter()
            .map(|s| s.voiceover_text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One descriptor per shot, keyed by shot number, in plan order.
    pub fn descriptors(&self) -> Result<Vec<ItemDescriptor>, serde_json::Error> {
        self.shots
            .iter()
            .map(|shot| {
                ItemDescriptor::from_params(
                    shot.shot_number,
                    &ShotParams {
                        title: shot.title.clone(),
                        visual_description: shot.visual_description.clone(),
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShotParams {
    title: String,
    visual_description: String,
}

/// Everything the storyboard request carries.
#[derive(Debug, Clone, Default)]
pub struct StoryboardInput {
    pub references: ReferenceInputs,
    pub product_description: String,
    pub selected_color: Option<String>,
    pub orientation: Orientation,
    pub language: Language,
    pub additional_prompt: Option<String>,
}

/// JSON schema constraining the plan response.
pub fn campaign_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "shots": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "shot_number": { "type": "INTEGER" },
                        "title": { "type": "STRING" },
                        "visual_description": { "type": "STRING" },
                        "voiceover_text": { "type": "STRING" },
                        "video_generation_prompt": {
                            "type": "OBJECT",
                            "properties": {
                                "prompt": { "type": "STRING" },
                                "negative_prompt": { "type": "STRING" },
                                "camera_movement": { "type": "STRING" }
                            },
                            "required": ["prompt", "camera_movement", "negative_prompt"]
                        }
                    },
                    "required": ["shot_number", "title", "visual_description", "voiceover_text", "video_generation_prompt"]
                }
            },
            "seo": {
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "description": { "type": "STRING" },
                    "hashtags": { "type": "STRING" }
                },
                "required": ["title", "description", "hashtags"]
            },
            "tts_instructions": { "type": "STRING" }
        },
        "required": ["shots", "seo", "tts_instructions"]
    })
}

/// Parse the planner's JSON text, tolerating a fenced code block around it.
pub fn parse_campaign(text: &str) -> Result<StoryboardCampaign, StudioError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    let campaign: StoryboardCampaign = serde_json::from_str(body.trim())?;
    campaign.validate()?;
    Ok(campaign)
}

fn color_clause(color: Option<&str>) -> String {
    color
        .map(|c| format!(" The product must be rendered in {}.", c))
        .unwrap_or_default()
}

/// Image task for one storyboard shot.
pub struct ShotImageTask<C> {
    client: Arc<C>,
    model: String,
    references: CheckedReferences,
    aspect_ratio: String,
}

impl<C: GenerationClient> ShotImageTask<C> {
    pub fn new(
        client: Arc<C>,
        model: impl Into<String>,
        references: CheckedReferences,
        aspect_ratio: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            references,
            aspect_ratio: aspect_ratio.into(),
        }
    }

    fn build_request(&self, visual_description: &str) -> ContentRequest {
        let mut parts = vec![Part::image(&self.references.primary)];
        let mut prompt = format!(
            "Photorealistic image of the exact product in the first reference image. Scenario: {}. \
             High-end editorial quality, sharp focus, realistic textures.",
            visual_description
        );
        if let Some(face) = &self.references.face {
            parts.push(Part::image(face));
            prompt.push_str(" Use the facial features of the face reference image.");
        }
        if let Some(background) = &self.references.background {
            parts.push(Part::image(background));
            prompt.push_str(" Place the scene in the environment of the background reference image.");
        }
        parts.push(Part::text(prompt));
        ContentRequest::new(self.model.clone(), parts).with_settings(GenerationSettings {
            aspect_ratio: Some(self.aspect_ratio.clone()),
            ..GenerationSettings::default()
        })
    }
}

#[async_trait]
impl<C: GenerationClient> ItemTask for ShotImageTask<C> {
    async fn generate(&self, descriptor: &ItemDescriptor) -> Result<ItemPayload, StudioError> {
        let visual_description = descriptor.param_str("visual_description").ok_or_else(|| {
            StudioError::GenerationFailed(format!(
                "shot {} has no visual description",
                descriptor.id
            ))
        })?;
        let response = self
            .client
            .generate_content(self.build_request(visual_description))
            .await?;
        Ok(ItemPayload::image(extract_image(&response)?))
    }

    fn stage(&self) -> &'static str {
        "storyboard_shot"
    }
}

/// Result of a storyboard request.
#[derive(Debug, Clone, Serialize)]
pub struct StoryboardRun {
    pub campaign: StoryboardCampaign,
    pub report: RunReport,
    pub state: Arc<RunState>,
    /// Secondary references dropped during preflight
    pub dropped_references: Vec<&'static str>,
}

/// Storyboard request pipeline: preflight, plan, then shot fan-out.
pub struct StoryboardPipeline<C> {
    client: Arc<C>,
    models: ModelSet,
    generation: GenerationConfig,
    coordinator: Arc<FanOutCoordinator>,
}

impl<C: GenerationClient + 'static> StoryboardPipeline<C> {
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

    /// Describe the product in the primary reference image.
    pub async fn analyze_product(
        &self,
        references: &ReferenceInputs,
        language: Language,
        selected_color: Option<&str>,
    ) -> Result<String, StudioError> {
        let checked = references.check(self.generation.reference_policy)?;
        let prompt = format!(
            "Describe exactly what fashion product this is, including material, pattern and style, \
             in one or two sentences.{} Write the description in {}.",
            selected_color
                .map(|c| format!(" The product should primarily be {}.", c))
                .unwrap_or_default(),
            language
        );
        let request = ContentRequest::new(
            self.models.analysis.clone(),
            vec![Part::image(&checked.primary), Part::text(prompt)],
        );
        let response = self.client.generate_content(request).await?;
        response
            .text()
            .map(|t| t.trim().to_string())
            .ok_or_else(|| StudioError::EmptyResponse(response.describe_empty()))
    }

    /// Generate the structured campaign plan.
    pub async fn plan(
        &self,
        primary: &crate::media::DataUri,
        input: &StoryboardInput,
    ) -> Result<StoryboardCampaign, StudioError> {
        let system_instruction = format!(
            "You are a fashion creative director and video prompt engineer. Create a {}-shot \
             B-roll storyboard for: \"{}\".{} Video prompts must call for natural spoken voiceover \
             with no background music and must not mention aspect ratios. Output JSON with \
             'shots', 'seo' and 'tts_instructions'. Language: {}.",
            SHOT_COUNT,
            input.product_description,
            color_clause(input.selected_color.as_deref()),
            input.language
        );
        let mut user_prompt = format!(
            "Create a {}-shot campaign for this product: {}.",
            SHOT_COUNT, input.product_description
        );
        if let Some(color) = &input.selected_color {
            user_prompt.push_str(&format!(" Color: {}.", color));
        }
        if let Some(extra) = input.additional_prompt.as_deref().filter(|e| !e.trim().is_empty()) {
            user_prompt.push_str(&format!(" Extra context: {}", extra));
        }

        let request = ContentRequest::new(
            self.models.plan.clone(),
            vec![Part::image(primary), Part::text(user_prompt)],
        )
        .with_system_instruction(system_instruction)
        .with_settings(GenerationSettings {
            response_schema: Some(campaign_schema()),
            ..GenerationSettings::default()
        });

        let response = self.client.generate_content(request).await?;
        let text = response
            .text()
            .ok_or_else(|| StudioError::EmptyResponse(format!("no plan: {}", response.describe_empty())))?;
        parse_campaign(&text)
    }

    /// Run the whole request. Any failure before the shot fan-out (references,
    /// plan) is returned once as a preflight error and nothing is dispatched.
    /// A request overtaken by a newer one while its plan was generating returns
    /// `Superseded` without disturbing the newer run.
    #[instrument(skip_all, fields(language = %input.language, orientation = ?input.orientation))]
    pub async fn run(&self, input: &StoryboardInput) -> Result<StoryboardRun, StudioError> {
        // A new request supersedes whatever the previous one left in flight
        let reset_id = self.coordinator.reset();

        let references = input.references.check(self.generation.reference_policy)?;
        if input.product_description.trim().is_empty() {
            return Err(StudioError::Preflight(
                "product description is required".to_string(),
            ));
        }

        let campaign = self
            .plan(&references.primary, input)
            .await
            .map_err(|e| match e {
                StudioError::Preflight(_) => e,
                other => StudioError::Preflight(format!("storyboard plan failed: {}", other)),
            })?;
        info!(shots = campaign.shots.len(), "Storyboard plan ready");

        let dropped_references = references.dropped.clone();
        let runner = TaskRunner::with_item_timeout(
            ShotImageTask::new(
                Arc::clone(&self.client),
                self.models.image.clone(),
                references,
                input.orientation.aspect_ratio(),
            ),
            self.generation.item_timeout(),
        );
        let descriptors = campaign.descriptors().map_err(|e| {
            StudioError::Preflight(format!("cannot build shot descriptors: {}", e))
        })?;
        let report = self
            .coordinator
            .run_if_current(reset_id, descriptors, &runner)
            .await?;

        Ok(StoryboardRun {
            campaign,
            report,
            state: self.coordinator.snapshot(),
            dropped_references,
        })
    }
}
