//! Shared test utilities for integration tests
//!
//! Provides environment isolation for config loading and a scripted generation
//! client that stands in for the hosted collaborator.

use async_trait::async_trait;
use shotlist::media::DataUri;
use shotlist::provider::{Candidate, ContentRequest, ContentResponse, GenerationClient, Part};
use shotlist::StudioError;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Variables that influence config loading and must not leak in from the host.
const ISOLATED_VARS: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "SHOTLIST_ENV",
    "GEMINI_API_KEY",
    "API_KEY",
];

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(String, Option<String>)>,
}

impl EnvState {
    fn capture(extra: &[(&str, &str)]) -> Self {
        let mut names: Vec<String> = ISOLATED_VARS.iter().map(|v| v.to_string()).collect();
        names.extend(
            std::env::vars()
                .map(|(k, _)| k)
                .filter(|k| k.starts_with("SHOTLIST__")),
        );
        names.extend(extra.iter().map(|(k, _)| k.to_string()));
        Self {
            saved: names
                .into_iter()
                .map(|name| {
                    let value = std::env::var(&name).ok();
                    (name, value)
                })
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(orig) => std::env::set_var(&name, orig),
                None => std::env::remove_var(&name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`, every
/// SHOTLIST__ and API key variable cleared, and `vars` set.
///
/// The global config file lives at `<test_dir>/shotlist/config.toml`.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture(vars);

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();

    for (name, _) in &env_state.saved {
        std::env::remove_var(name);
    }
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().to_str().unwrap());
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    env_state.restore();

    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Write the global config file for an isolated environment.
pub fn write_global_config(test_dir: &TempDir, contents: &str) {
    let dir = test_dir.path().join("shotlist");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), contents).unwrap();
}

/// Write `config/config.toml` inside a workspace.
pub fn write_workspace_config(workspace: &std::path::Path, contents: &str) {
    let dir = workspace.join("config");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), contents).unwrap();
}

/// A tiny reference image as a data URI.
pub fn reference_image(marker: &[u8]) -> String {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(marker);
    DataUri::from_bytes("image/png", &bytes).to_string()
}

/// Scripted stand-in for the generation collaborator.
///
/// Requests carrying a response schema get `plan` after `plan_delay`; requests for the analysis
/// model get `analysis`; requests with an audio voice get `audio`; anything
/// else is treated as an image request. Image prompts containing a `failing`
/// marker fail with a rate limit error, and prompts containing a `delays`
/// marker resolve after that delay.
pub struct ScriptedClient {
    pub analysis_model: String,
    pub plan: Option<String>,
    pub plan_delay: Duration,
    pub analysis: Option<String>,
    pub audio: Option<Vec<u8>>,
    pub failing: Vec<String>,
    pub delays: Vec<(String, Duration)>,
    pub default_delay: Duration,
    requests: parking_lot::Mutex<Vec<ContentRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            analysis_model: "analysis-model".to_string(),
            plan: None,
            plan_delay: Duration::ZERO,
            analysis: None,
            audio: None,
            failing: Vec::new(),
            delays: Vec::new(),
            default_delay: Duration::ZERO,
            requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_plan_delay(mut self, delay: Duration) -> Self {
        self.plan_delay = delay;
        self
    }

    pub fn with_analysis(mut self, text: impl Into<String>) -> Self {
        self.analysis = Some(text.into());
        self
    }

    pub fn with_audio(mut self, pcm: Vec<u8>) -> Self {
        self.audio = Some(pcm);
        self
    }

    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.failing.push(marker.into());
        self
    }

    pub fn delayed_on(mut self, marker: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((marker.into(), delay));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ContentRequest> {
        self.requests.lock().clone()
    }

    /// Image requests only, in arrival order.
    pub fn image_requests(&self) -> Vec<ContentRequest> {
        self.requests()
            .into_iter()
            .filter(|r| {
                r.settings.response_schema.is_none()
                    && r.settings.voice.is_none()
                    && r.model != self.analysis_model
            })
            .collect()
    }

    fn text_response(text: &str) -> ContentResponse {
        ContentResponse {
            candidates: vec![Candidate {
                parts: vec![Part::text(text)],
                finish_reason: Some("STOP".to_string()),
            }],
            block_reason: None,
        }
    }

    fn inline_response(mime_type: &str, bytes: &[u8]) -> ContentResponse {
        let uri = DataUri::from_bytes(mime_type, bytes);
        ContentResponse {
            candidates: vec![Candidate {
                parts: vec![Part::InlineData {
                    mime_type: mime_type.to_string(),
                    data: uri.data().to_string(),
                }],
                finish_reason: Some("STOP".to_string()),
            }],
            block_reason: None,
        }
    }
}

fn prompt_text(request: &ContentRequest) -> String {
    request
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text(t) => Some(t.as_str()),
            Part::InlineData { .. } => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate_content(&self, request: ContentRequest) -> Result<ContentResponse, StudioError> {
        self.requests.lock().push(request.clone());

        if request.settings.response_schema.is_some() {
            if !self.plan_delay.is_zero() {
                tokio::time::sleep(self.plan_delay).await;
            }
            return match &self.plan {
                Some(plan) => Ok(Self::text_response(plan)),
                None => Err(StudioError::EmptyResponse("no candidates returned".to_string())),
            };
        }
        if request.model == self.analysis_model {
            return match &self.analysis {
                Some(text) => Ok(Self::text_response(text)),
                None => Err(StudioError::ProviderRequestFailed("analysis unavailable".to_string())),
            };
        }
        if request.settings.voice.is_some() {
            return match &self.audio {
                Some(pcm) => Ok(Self::inline_response("audio/L16;codec=pcm;rate=24000", pcm)),
                None => Err(StudioError::EmptyResponse("no audio".to_string())),
            };
        }

        let prompt = prompt_text(&request);
        let delay = self
            .delays
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, d)| *d)
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.iter().any(|marker| prompt.contains(marker.as_str())) {
            return Err(StudioError::ProviderRateLimit("quota exceeded".to_string()));
        }
        Ok(Self::inline_response("image/png", prompt.as_bytes()))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Plan JSON with `count` shots; shot N has the visual description "scene N.".
pub fn plan_json(count: u32) -> String {
    let shots: Vec<serde_json::Value> = (1..=count)
        .map(|n| {
            serde_json::json!({
                "shot_number": n,
                "title": format!("Shot {}", n),
                "visual_description": format!("scene {}.", n),
                "voiceover_text": format!("Line {}", n),
                "video_generation_prompt": {
                    "prompt": format!("Slow reveal {}", n),
                    "negative_prompt": "music",
                    "camera_movement": "Dolly In"
                }
            })
        })
        .collect();
    serde_json::json!({
        "shots": shots,
        "seo": {
            "title": "Linen Summer",
            "description": "A breezy linen shirt",
            "hashtags": "#linen #summer"
        },
        "tts_instructions": "Warm and relaxed"
    })
    .to_string()
}
