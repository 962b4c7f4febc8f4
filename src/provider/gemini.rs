//! Gemini REST client for content and long-running video generation.

use crate::error::StudioError;
use crate::provider::{
    Candidate, ContentRequest, ContentResponse, GenerationClient, Part, ProviderConfig,
    VideoClient, VideoOperation, VideoRequest,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

// Wire structures for generateContent

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireBlob>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn to_wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart {
            text: Some(text.clone()),
            inline_data: None,
        },
        Part::InlineData { mime_type, data } => WirePart {
            text: None,
            inline_data: Some(WireBlob {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
        },
    }
}

fn from_wire_part(part: WirePart) -> Option<Part> {
    if let Some(blob) = part.inline_data {
        return Some(Part::InlineData {
            mime_type: blob.mime_type,
            data: blob.data,
        });
    }
    part.text.map(Part::Text)
}

/// Build the generateContent request body.
pub(crate) fn build_request_body(request: &ContentRequest) -> Value {
    let settings = &request.settings;
    let mut generation_config = serde_json::Map::new();
    if let Some(schema) = &settings.response_schema {
        generation_config.insert("responseMimeType".to_string(), json!("application/json"));
        generation_config.insert("responseSchema".to_string(), schema.clone());
    }
    if let Some(aspect_ratio) = &settings.aspect_ratio {
        generation_config.insert(
            "imageConfig".to_string(),
            json!({ "aspectRatio": aspect_ratio }),
        );
    }
    if !settings.response_modalities.is_empty() {
        generation_config.insert(
            "responseModalities".to_string(),
            json!(settings.response_modalities),
        );
    }
    if let Some(voice) = &settings.voice {
        generation_config.insert(
            "speechConfig".to_string(),
            json!({ "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } } }),
        );
    }
    if let Some(temperature) = settings.temperature {
        generation_config.insert("temperature".to_string(), json!(temperature));
    }

    let wire = WireRequest {
        contents: vec![WireContent {
            role: Some("user".to_string()),
            parts: request.parts.iter().map(to_wire_part).collect(),
        }],
        system_instruction: request.system_instruction.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart {
                text: Some(text.clone()),
                inline_data: None,
            }],
        }),
        generation_config: if generation_config.is_empty() {
            None
        } else {
            Some(Value::Object(generation_config))
        },
    };
    // WireRequest only holds strings and JSON values
    serde_json::to_value(wire).unwrap_or(Value::Null)
}

/// Parse a generateContent response body.
pub(crate) fn parse_response_body(body: &str) -> Result<ContentResponse, StudioError> {
    let wire: WireResponse = serde_json::from_str(body).map_err(|e| {
        StudioError::MalformedResponse(format!("Failed to parse response: {}", e))
    })?;
    Ok(ContentResponse {
        candidates: wire
            .candidates
            .into_iter()
            .map(|c| Candidate {
                parts: c
                    .content
                    .map(|content| content.parts.into_iter().filter_map(from_wire_part).collect())
                    .unwrap_or_default(),
                finish_reason: c.finish_reason,
            })
            .collect(),
        block_reason: wire.prompt_feedback.and_then(|f| f.block_reason),
    })
}

/// Parse a long-running operation document.
pub(crate) fn parse_operation(body: &Value) -> Result<VideoOperation, StudioError> {
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StudioError::MalformedResponse("operation has no name".to_string()))?
        .to_string();
    let done = body.get("done").and_then(Value::as_bool).unwrap_or(false);
    let error = body.get("error").map(|e| {
        e.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| e.to_string())
    });
    let video_uri = body
        .pointer("/response/generateVideoResponse/generatedSamples/0/video/uri")
        .or_else(|| body.pointer("/response/generatedVideos/0/video/uri"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(VideoOperation {
        name,
        done,
        video_uri,
        error,
    })
}

fn map_status(status: StatusCode, body: &str) -> StudioError {
    match status.as_u16() {
        401 | 403 => StudioError::ProviderAuthFailed(format!("Authentication failed: {}", body)),
        429 => StudioError::ProviderRateLimit(format!("Rate limit exceeded: {}", body)),
        404 => StudioError::ProviderModelNotFound(format!("Model not found: {}", body)),
        _ => StudioError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

// Helper function to map transport errors to StudioError
fn map_http_error(error: reqwest::Error) -> StudioError {
    if error.is_timeout() {
        StudioError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        StudioError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        StudioError::ProviderError(format!("HTTP error: {}", error))
    }
}

/// Gemini provider client
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, StudioError> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| StudioError::ProviderError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<String, StudioError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_http_error)?;
        Self::read_body(response).await
    }

    async fn read_body(response: reqwest::Response) -> Result<String, StudioError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StudioError::ProviderError(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(map_status(status, &text));
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate_content(
        &self,
        request: ContentRequest,
    ) -> Result<ContentResponse, StudioError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, request.model);
        debug!(model = %request.model, parts = request.parts.len(), "generateContent");
        let body = build_request_body(&request);
        let text = self.post_json(&url, &body).await?;
        parse_response_body(&text)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl VideoClient for GeminiClient {
    async fn start_video(&self, request: VideoRequest) -> Result<VideoOperation, StudioError> {
        let url = format!("{}/models/{}:predictLongRunning", self.endpoint, request.model);
        let mut instance = json!({ "prompt": request.prompt });
        if let Some(image) = &request.image {
            instance["image"] = json!({
                "bytesBase64Encoded": image.data(),
                "mimeType": image.mime_type(),
            });
        }
        let body = json!({
            "instances": [instance],
            "parameters": {
                "aspectRatio": request.aspect_ratio,
                "resolution": request.resolution,
                "sampleCount": 1,
            }
        });
        let text = self.post_json(&url, &body).await?;
        let value: Value = serde_json::from_str(&text)?;
        parse_operation(&value)
    }

    async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoOperation, StudioError> {
        let url = format!("{}/{}", self.endpoint, operation.name);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(map_http_error)?;
        let text = Self::read_body(response).await?;
        let value: Value = serde_json::from_str(&text)?;
        parse_operation(&value)
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, StudioError> {
        let response = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(map_http_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "video download failed");
            return Err(map_status(status, &text));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StudioError::ProviderError(format!("Failed to read video: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
