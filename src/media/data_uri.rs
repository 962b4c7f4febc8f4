//! Canonical `data:<mime-type>;base64,<payload>` image encoding.

use crate::error::MediaError;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Mime type assumed for references that carry no metadata.
pub const DEFAULT_REFERENCE_MIME: &str = "image/jpeg";

/// Mime type assumed for generated images that omit one.
pub const DEFAULT_GENERATED_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Build from a mime type and an already standard-base64 payload.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, STANDARD.encode(bytes))
    }

    /// Strict parse of a canonical data URI.
    pub fn parse(input: &str) -> Result<Self, MediaError> {
        let rest = input
            .strip_prefix("data:")
            .ok_or_else(|| MediaError::InvalidDataUri("missing 'data:' prefix".to_string()))?;
        let (metadata, payload) = rest
            .split_once(',')
            .ok_or_else(|| MediaError::InvalidDataUri("missing ',' separator".to_string()))?;
        let mime_type = metadata.strip_suffix(";base64").ok_or_else(|| {
            MediaError::InvalidDataUri(format!("expected base64 encoding in '{}'", metadata))
        })?;
        if mime_type.is_empty() {
            return Err(MediaError::InvalidDataUri("empty mime type".to_string()));
        }
        if payload.is_empty() {
            return Err(MediaError::InvalidDataUri("empty payload".to_string()));
        }
        Ok(Self::new(mime_type, payload))
    }

    /// Lenient reading of a user-supplied reference image.
    ///
    /// A `data:` URI is split into mime type and payload; the mime type falls back
    /// to `image/jpeg` when the metadata has none. Anything else is taken as raw
    /// base64 of a JPEG.
    pub fn from_reference(input: &str) -> Self {
        if let Some(rest) = input.strip_prefix("data:") {
            if let Some((metadata, payload)) = rest.split_once(',') {
                let mime_type = metadata
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_REFERENCE_MIME);
                return Self::new(mime_type, payload);
            }
        }
        Self::new(DEFAULT_REFERENCE_MIME, input)
    }

    /// Re-encode a collaborator payload into canonical form.
    ///
    /// Accepts a canonical URI or a bare payload in any common base64 alphabet
    /// (standard or URL-safe, padded or not, with embedded whitespace). The
    /// result always carries standard padded base64.
    pub fn canonicalize(mime_type: Option<&str>, raw: &str) -> Result<Self, MediaError> {
        let (mime, payload) = match raw.strip_prefix("data:") {
            Some(_) => {
                let parsed = Self::from_reference(raw);
                (parsed.mime_type, parsed.data)
            }
            None => (
                mime_type
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_GENERATED_MIME)
                    .to_string(),
                raw.to_string(),
            ),
        };
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(MediaError::InvalidDataUri("empty payload".to_string()));
        }
        let bytes = decode_any(&compact)?;
        Ok(Self::from_bytes(mime, &bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without the URI prefix.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn decode(&self) -> Result<Vec<u8>, MediaError> {
        decode_any(&self.data)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn decode_any(payload: &str) -> Result<Vec<u8>, MediaError> {
    let mut last_err = None;
    for engine in [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD] {
        match engine.decode(payload) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(MediaError::InvalidBase64(e)),
        None => Err(MediaError::InvalidDataUri("empty payload".to_string())),
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl FromStr for DataUri {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
