//! Preflight checks run once per request, before any item is dispatched.

use crate::error::StudioError;
use crate::media::DataUri;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Handling of a secondary reference image (face, background) that was supplied
/// but cannot be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Drop the unusable reference and generate with reduced context.
    #[default]
    Degrade,
    /// Fail the whole run before fan-out.
    Strict,
}

/// Reference images as supplied by the caller: a data URI or bare base64.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceInputs {
    pub primary: Option<String>,
    pub face: Option<String>,
    pub background: Option<String>,
}

/// References that passed preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedReferences {
    pub primary: DataUri,
    pub face: Option<DataUri>,
    pub background: Option<DataUri>,
    /// Secondary references dropped under `ReferencePolicy::Degrade`
    pub dropped: Vec<&'static str>,
}

fn usable(raw: &str) -> Result<DataUri, String> {
    if raw.trim().is_empty() {
        return Err("empty".to_string());
    }
    let uri = DataUri::from_reference(raw.trim());
    match uri.decode() {
        Ok(bytes) if !bytes.is_empty() => Ok(uri),
        Ok(_) => Err("empty".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

impl ReferenceInputs {
    pub fn check(&self, policy: ReferencePolicy) -> Result<CheckedReferences, StudioError> {
        let primary = match self.primary.as_deref() {
            None => {
                return Err(StudioError::Preflight(
                    "a primary reference image is required".to_string(),
                ))
            }
            Some(raw) => usable(raw).map_err(|reason| {
                StudioError::Preflight(format!("primary reference image is unusable: {}", reason))
            })?,
        };

        let mut dropped = Vec::new();
        let mut secondary = |name: &'static str, raw: Option<&str>| -> Result<Option<DataUri>, StudioError> {
            let Some(raw) = raw else {
                return Ok(None);
            };
            match usable(raw) {
                Ok(uri) => Ok(Some(uri)),
                Err(reason) => match policy {
                    ReferencePolicy::Strict => Err(StudioError::Preflight(format!(
                        "{} reference image is unusable: {}",
                        name, reason
                    ))),
                    ReferencePolicy::Degrade => {
                        warn!(reference = name, %reason, "Dropping unusable reference image");
                        dropped.push(name);
                        Ok(None)
                    }
                },
            }
        };

        let face = secondary("face", self.face.as_deref())?;
        let background = secondary("background", self.background.as_deref())?;

        Ok(CheckedReferences {
            primary,
            face,
            background,
            dropped,
        })
    }
}
