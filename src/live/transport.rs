//! Websocket transport to the bidirectional live endpoint.

use crate::error::SessionError;
use crate::live::framing::UplinkChunk;
use crate::live::session::{LiveConnector, LiveTransport};
use crate::provider::ProviderConfig;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Session configuration sent once after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    pub model: String,
    pub voice: String,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Setup(SessionSetup),
    Audio(UplinkChunk),
    /// Capture ended; no more audio follows
    AudioStreamEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    SetupComplete,
    /// Base64 16-bit PCM at the output rate
    Audio { mime_type: String, data: String },
    /// The peer cut its own turn short; queued playback is stale
    Interrupted,
    TurnComplete,
    /// The peer announced it will close the connection soon
    GoAway { time_left: Option<String> },
}

pub fn setup_message(setup: &SessionSetup) -> Value {
    let model = if setup.model.starts_with("models/") {
        setup.model.clone()
    } else {
        format!("models/{}", setup.model)
    };
    let mut body = json!({
        "model": model,
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": setup.voice }
                }
            }
        }
    });
    if let Some(instruction) = &setup.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }
    json!({ "setup": body })
}

pub fn realtime_input_message(chunk: &UplinkChunk) -> Value {
    json!({
        "realtimeInput": {
            "mediaChunks": [{ "mimeType": chunk.mime_type, "data": chunk.data }]
        }
    })
}

pub fn encode_client_message(message: &ClientMessage) -> String {
    match message {
        ClientMessage::Setup(setup) => setup_message(setup),
        ClientMessage::Audio(chunk) => realtime_input_message(chunk),
        ClientMessage::AudioStreamEnd => json!({ "realtimeInput": { "audioStreamEnd": true } }),
    }
    .to_string()
}

/// Decode one server frame into zero or more events, in message order.
pub fn parse_server_message(text: &str) -> Result<Vec<ServerEvent>, SessionError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SessionError::Transport(format!("invalid server message: {}", e)))?;

    if let Some(error) = value.get("error") {
        return Err(SessionError::Transport(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ));
    }

    let mut events = Vec::new();
    if value.get("setupComplete").is_some() {
        events.push(ServerEvent::SetupComplete);
    }
    if let Some(go_away) = value.get("goAway") {
        events.push(ServerEvent::GoAway {
            time_left: go_away
                .get("timeLeft")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
    if let Some(content) = value.get("serverContent") {
        if content.get("interrupted").and_then(Value::as_bool) == Some(true) {
            events.push(ServerEvent::Interrupted);
        }
        let parts = content
            .pointer("/modelTurn/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part.get("inlineData") else {
                continue;
            };
            if let Some(data) = inline.get("data").and_then(Value::as_str) {
                events.push(ServerEvent::Audio {
                    mime_type: inline
                        .get("mimeType")
                        .and_then(Value::as_str)
                        .unwrap_or("audio/pcm")
                        .to_string(),
                    data: data.to_string(),
                });
            }
        }
        if content.get("turnComplete").and_then(Value::as_bool) == Some(true) {
            events.push(ServerEvent::TurnComplete);
        }
    }
    Ok(events)
}

/// Connects to the live endpoint with the provider's credentials.
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
    connect_timeout: Duration,
}

impl GeminiLiveConnector {
    pub fn new(config: &ProviderConfig) -> Result<Self, crate::error::StudioError> {
        Ok(Self {
            endpoint: config.live_endpoint.clone(),
            api_key: config.require_api_key()?.to_string(),
            connect_timeout: config.connect_timeout(),
        })
    }

    fn url(&self) -> Result<String, SessionError> {
        let mut url = url::Url::parse(&self.endpoint)
            .map_err(|e| SessionError::ConnectFailed(format!("invalid live endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url.into())
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    type Transport = GeminiLiveTransport;

    async fn connect(&self) -> Result<Self::Transport, SessionError> {
        let url = self.url()?;
        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                SessionError::ConnectFailed(format!(
                    "no handshake within {}s",
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| SessionError::ConnectFailed(e.to_string()))?;
        info!(status = %response.status(), "Live transport connected");
        Ok(GeminiLiveTransport {
            stream,
            pending: VecDeque::new(),
        })
    }
}

pub struct GeminiLiveTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<ServerEvent>,
}

#[async_trait]
impl LiveTransport for GeminiLiveTransport {
    async fn send(&mut self, message: &ClientMessage) -> Result<(), SessionError> {
        self.stream
            .send(Message::Text(encode_client_message(message)))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Result<ServerEvent, SessionError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            let text = match self.stream.next().await {
                None => return Err(SessionError::ClosedByPeer("stream ended".to_string())),
                Some(Err(e)) => return Err(SessionError::Transport(e.to_string())),
                Some(Ok(Message::Text(text))) => text,
                // The live endpoint sends JSON in binary frames as well
                Some(Ok(Message::Binary(bytes))) => String::from_utf8(bytes)
                    .map_err(|e| SessionError::Transport(format!("non-UTF-8 frame: {}", e)))?,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Err(SessionError::ClosedByPeer(reason));
                }
                Some(Ok(other)) => {
                    debug!(kind = ?other, "Ignoring control frame");
                    continue;
                }
            };
            self.pending.extend(parse_server_message(&text)?);
        }
    }

    async fn close(&mut self) {
        // Sends our close frame; the peer's acknowledgement is not awaited
        if let Err(e) = self.stream.close(None).await {
            warn!(error = %e, "Live transport close failed");
        }
    }
}
