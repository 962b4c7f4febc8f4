//! Text-to-speech: one audio request, raw PCM back, WAV for download.

use crate::error::StudioError;
use crate::media::{encode_wav, pcm, PcmFormat};
use crate::provider::{ContentRequest, GenerationClient, GenerationSettings, Modality, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    /// Delivery instruction prefixed to the text, e.g. "Say cheerfully"
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: crate::config::default_voice(),
            instruction: None,
            temperature: None,
        }
    }

    pub fn prompt(&self) -> String {
        match self.instruction.as_deref().map(str::trim) {
            Some(instruction) if !instruction.is_empty() => {
                format!("{}: {}", instruction, self.text)
            }
            _ => self.text.clone(),
        }
    }
}

/// Generated speech as 16-bit little-endian PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechClip {
    pub pcm: Vec<u8>,
    pub format: PcmFormat,
}

impl SpeechClip {
    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.pcm.len())
    }

    pub fn to_wav(&self) -> Result<Vec<u8>, StudioError> {
        Ok(encode_wav(&self.pcm, self.format)?)
    }
}

#[instrument(skip_all, fields(voice = %request.voice, chars = request.text.len()))]
pub async fn generate_speech<C: GenerationClient + ?Sized>(
    client: &C,
    model: &str,
    request: &SpeechRequest,
    format: PcmFormat,
) -> Result<SpeechClip, StudioError> {
    if request.text.trim().is_empty() {
        return Err(StudioError::Preflight("speech text is empty".to_string()));
    }

    let content = ContentRequest::new(model, vec![Part::text(request.prompt())]).with_settings(
        GenerationSettings {
            response_modalities: vec![Modality::Audio],
            voice: Some(request.voice.clone()),
            temperature: request.temperature,
            ..GenerationSettings::default()
        },
    );
    let response = client.generate_content(content).await?;
    let (_, data) = response
        .inline_data()
        .ok_or_else(|| StudioError::EmptyResponse(format!("no audio: {}", response.describe_empty())))?;
    let pcm = pcm::decode_base64(data)?;
    // Validates sample alignment
    pcm::from_le_bytes(&pcm)?;

    let clip = SpeechClip { pcm, format };
    debug!(duration_ms = clip.duration().as_millis() as u64, "Speech generated");
    Ok(clip)
}
