//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::help::command_name;
use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_config_show, format_config_validation, format_run_json, format_run_text,
    format_session_report, format_speech_result, format_video_result, run_rows, SpeechSummary,
    VideoSummary,
};
use crate::config::{ConfigLoader, StudioConfig};
use crate::error::StudioError;
use crate::generation::{FanOutCoordinator, ItemStatus, ReferenceInputs, RunState};
use crate::live::{
    GeminiLiveConnector, LiveSession, SessionOptions, SessionSetup, WavFileCapture, WavFileSink,
};
use crate::media::DataUri;
use crate::pose::{PoseEditRequest, PoseEditor, POSE_VARIANTS};
use crate::provider::GeminiClient;
use crate::speech::{generate_speech, SpeechRequest};
use crate::storyboard::{Language, Orientation, StoryboardInput, StoryboardPipeline};
use crate::types::ItemId;
use crate::video::{generate_video, video_request, PollPolicy};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{info, info_span, warn};

/// Runtime context for CLI execution: workspace, effective config and the async runtime.
pub struct RunContext {
    workspace_root: PathBuf,
    config: StudioConfig,
    runtime: Runtime,
    coordinator: Arc<FanOutCoordinator>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, StudioError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        let runtime = Runtime::new()?;
        Ok(Self {
            workspace_root,
            config,
            runtime,
            coordinator: Arc::new(FanOutCoordinator::new()),
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, StudioError> {
        let name = command_name(command);
        let span = info_span!("command", command = %name);
        let _guard = span.enter();
        let started = Instant::now();
        let result = self.execute_inner(command);
        match &result {
            Ok(_) => info!(duration_ms = started.elapsed().as_millis() as u64, "Command finished"),
            Err(e) => warn!(error = %e, duration_ms = started.elapsed().as_millis() as u64, "Command failed"),
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, StudioError> {
        match command {
            Commands::Config { command } => self.handle_config_command(command),
            Commands::Storyboard {
                product,
                face,
                background,
                description,
                color,
                orientation,
                language,
                prompt,
                out,
                format,
            } => {
                let references = ReferenceInputs {
                    primary: Some(self.load_image(product)?),
                    face: face.as_deref().map(|p| self.load_image(p)).transpose()?,
                    background: background.as_deref().map(|p| self.load_image(p)).transpose()?,
                };
                let input = StoryboardInput {
                    references,
                    product_description: description.clone().unwrap_or_default(),
                    selected_color: color.clone(),
                    orientation: orientation.parse::<Orientation>()?,
                    language: language.parse::<Language>()?,
                    additional_prompt: prompt.clone(),
                };
                self.handle_storyboard(input, &self.resolve(out), format)
            }
            Commands::Edit {
                image,
                face,
                background,
                prompt,
                aspect_ratio,
                color,
                out,
                format,
            } => {
                let request = PoseEditRequest {
                    references: ReferenceInputs {
                        primary: Some(self.load_image(image)?),
                        face: face.as_deref().map(|p| self.load_image(p)).transpose()?,
                        background: background.as_deref().map(|p| self.load_image(p)).transpose()?,
                    },
                    instruction: prompt.clone(),
                    aspect_ratio: aspect_ratio.clone(),
                    selected_color: color.clone(),
                };
                self.handle_edit(request, &self.resolve(out), format)
            }
            Commands::Speak {
                text,
                text_file,
                voice,
                instruction,
                temperature,
                out,
                format,
            } => {
                let text = match (text, text_file) {
                    (Some(text), _) => text.clone(),
                    (None, Some(path)) => std::fs::read_to_string(self.resolve(path))?,
                    (None, None) => {
                        return Err(StudioError::Preflight(
                            "either --text or --text-file is required".to_string(),
                        ))
                    }
                };
                let request = SpeechRequest {
                    text,
                    voice: voice.clone().unwrap_or_else(|| self.config.audio.voice.clone()),
                    instruction: instruction.clone(),
                    temperature: *temperature,
                };
                self.handle_speak(request, &self.resolve(out), format)
            }
            Commands::Video {
                image,
                prompt,
                aspect_ratio,
                out,
                format,
            } => self.handle_video(image, prompt, aspect_ratio, &self.resolve(out), format),
            Commands::Live {
                input,
                output,
                voice,
                instruction,
                format,
            } => self.handle_live(
                &self.resolve(input),
                &self.resolve(output),
                voice.as_deref(),
                instruction.clone(),
                format,
            ),
        }
    }

    fn handle_config_command(&self, command: &ConfigCommands) -> Result<String, StudioError> {
        match command {
            ConfigCommands::Show { format } => Ok(format_config_show(&self.config, format)),
            ConfigCommands::Validate { format } => {
                Ok(format_config_validation(&self.config.validate(), format))
            }
        }
    }

    fn handle_storyboard(
        &self,
        mut input: StoryboardInput,
        out: &Path,
        format: &str,
    ) -> Result<String, StudioError> {
        let config = self.validated_config()?;
        let client = Arc::new(GeminiClient::new(&config.provider)?);
        let pipeline = StoryboardPipeline::new(
            client,
            config.provider.models.clone(),
            config.generation.clone(),
            Arc::clone(&self.coordinator),
        );

        let run = self.runtime.block_on(async {
            if input.product_description.trim().is_empty() {
                let description = pipeline
                    .analyze_product(&input.references, input.language, input.selected_color.as_deref())
                    .await
                    .map_err(|e| StudioError::Preflight(format!("product analysis failed: {}", e)))?;
                info!(%description, "Product analyzed");
                input.product_description = description;
            }
            pipeline.run(&input).await
        })?;

        std::fs::create_dir_all(out)?;
        let labels: HashMap<ItemId, String> = run
            .campaign
            .shots
            .iter()
            .map(|s| (ItemId(s.shot_number), s.title.clone()))
            .collect();
        let files = write_loaded_images(&run.state, out, "shot")?;
        let plan_path = out.join("campaign.json");
        std::fs::write(&plan_path, serde_json::to_vec_pretty(&run.campaign)?)?;
        let script_path = out.join("voiceover.txt");
        std::fs::write(&script_path, run.campaign.voiceover_script())?;

        let rows = run_rows(&run.state, &labels, &files);
        if format == "json" {
            return Ok(format_run_json(
                &run.report,
                &rows,
                json!({
                    "campaign": plan_path,
                    "voiceover": script_path,
                    "seo": run.campaign.seo,
                    "dropped_references": run.dropped_references,
                }),
            ));
        }
        let mut text = format_run_text("Storyboard", &run.report, &rows);
        text.push_str(&format!(
            "\nSEO title: {}\nCampaign plan: {}\nVoiceover script: {}",
            run.campaign.seo.title,
            plan_path.display(),
            script_path.display()
        ));
        for dropped in &run.dropped_references {
            text.push_str(&format!("\nIgnored unusable {} reference image", dropped));
        }
        Ok(text)
    }

    fn handle_edit(
        &self,
        request: PoseEditRequest,
        out: &Path,
        format: &str,
    ) -> Result<String, StudioError> {
        let config = self.validated_config()?;
        let client = Arc::new(GeminiClient::new(&config.provider)?);
        let editor = PoseEditor::new(
            client,
            config.provider.models.clone(),
            config.generation.clone(),
            Arc::clone(&self.coordinator),
        );
        let run = self.runtime.block_on(editor.run(&request))?;

        std::fs::create_dir_all(out)?;
        let files = write_loaded_images(&run.state, out, "variant")?;
        for entry in run.state.entries() {
            if let Some(doc) = entry.payload.as_ref().and_then(|p| p.video_prompt.as_ref()) {
                let path = out.join(format!("variant-{:02}.video.json", entry.id.as_u32()));
                std::fs::write(path, serde_json::to_vec_pretty(doc)?)?;
            }
        }
        let labels: HashMap<ItemId, String> = POSE_VARIANTS
            .iter()
            .zip(1u32..)
            .map(|(v, id)| (ItemId(id), format!("{} / {}", v.angle, v.pose)))
            .collect();
        let rows = run_rows(&run.state, &labels, &files);
        if format == "json" {
            return Ok(format_run_json(
                &run.report,
                &rows,
                json!({ "dropped_references": run.dropped_references }),
            ));
        }
        Ok(format_run_text("Pose variants", &run.report, &rows))
    }

    fn handle_speak(
        &self,
        request: SpeechRequest,
        out: &Path,
        format: &str,
    ) -> Result<String, StudioError> {
        let config = self.validated_config()?;
        let client = GeminiClient::new(&config.provider)?;
        let clip = self.runtime.block_on(generate_speech(
            &client,
            &config.provider.models.speech,
            &request,
            config.audio.output_format(),
        ))?;
        let wav = clip.to_wav()?;
        write_file(out, &wav)?;
        Ok(format_speech_result(
            &SpeechSummary {
                path: out.to_path_buf(),
                voice: request.voice,
                sample_rate: clip.format.sample_rate,
                duration_secs: clip.duration().as_secs_f64(),
                bytes: wav.len(),
            },
            format,
        ))
    }

    fn handle_video(
        &self,
        image: &Path,
        prompt: &str,
        aspect_ratio: &str,
        out: &Path,
        format: &str,
    ) -> Result<String, StudioError> {
        let config = self.validated_config()?;
        let client = GeminiClient::new(&config.provider)?;
        let image = DataUri::parse(&self.load_image(image)?)?;
        let request = video_request(
            &config.provider.models.video,
            prompt,
            image,
            aspect_ratio,
            &config.video.resolution,
        )?;
        let video = self.runtime.block_on(generate_video(
            &client,
            request,
            PollPolicy::from(&config.video),
        ))?;
        write_file(out, &video.bytes)?;
        Ok(format_video_result(
            &VideoSummary {
                path: out.to_path_buf(),
                operation: video.operation,
                polls: video.polls,
                bytes: video.bytes.len(),
            },
            format,
        ))
    }

    fn handle_live(
        &self,
        input: &Path,
        output: &Path,
        voice: Option<&str>,
        instruction: Option<String>,
        format: &str,
    ) -> Result<String, StudioError> {
        let config = self.validated_config()?;
        let connector = GeminiLiveConnector::new(&config.provider)?;
        let audio = &config.audio;
        let options = SessionOptions {
            frame_size: audio.frame_size,
            input_format: audio.input_format(),
            output_format: audio.output_format(),
        };
        let setup = SessionSetup {
            model: config.provider.models.live.clone(),
            voice: voice.map(str::to_string).unwrap_or_else(|| audio.voice.clone()),
            system_instruction: instruction,
        };

        let (report, sink) = self.runtime.block_on(async {
            let (session, handle) = LiveSession::new(
                WavFileCapture::new(input, audio.frame_size),
                WavFileSink::new(options.output_format),
                connector,
                setup,
                options,
            );
            let stopper = handle.clone();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stopper.stop();
                }
            });
            let result = session.run().await;
            ctrl_c.abort();
            result
        });

        write_file(output, &sink.to_wav()?)?;
        let rendered = format_session_report(&report, output, format);
        match report.error() {
            Some(e) => Err(StudioError::Session(e.clone())),
            None => Ok(rendered),
        }
    }

    fn validated_config(&self) -> Result<StudioConfig, StudioError> {
        self.config.clone().validated()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    /// Read an image file as a data URI string.
    fn load_image(&self, path: &Path) -> Result<String, StudioError> {
        let path = self.resolve(path);
        let bytes = std::fs::read(&path).map_err(|e| {
            StudioError::Preflight(format!("cannot read image {}: {}", path.display(), e))
        })?;
        Ok(DataUri::from_bytes(image_mime(&path), &bytes).to_string())
    }
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StudioError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Write every loaded item's image as `<prefix>-NN.<ext>`.
fn write_loaded_images(
    state: &RunState,
    out: &Path,
    prefix: &str,
) -> Result<HashMap<ItemId, PathBuf>, StudioError> {
    let mut files = HashMap::new();
    for entry in state.entries() {
        if entry.status != ItemStatus::Loaded {
            continue;
        }
        let Some(payload) = entry.payload.as_ref() else {
            continue;
        };
        let path = out.join(format!(
            "{}-{:02}.{}",
            prefix,
            entry.id.as_u32(),
            extension_for(payload.image.mime_type())
        ));
        std::fs::write(&path, payload.image.decode()?)?;
        files.insert(entry.id, path);
    }
    Ok(files)
}
