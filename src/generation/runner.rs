//! Generation task runner: one descriptor, one collaborator call, one outcome.

use crate::error::StudioError;
use crate::generation::descriptor::ItemDescriptor;
use crate::generation::outcome::{GenerationOutcome, ItemPayload};
use crate::media::DataUri;
use crate::provider::ContentResponse;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The per-item unit of work of one fan-out stage.
///
/// Implementations make exactly one collaborator call and must not touch
/// shared state; the coordinator owns all state updates.
#[async_trait]
pub trait ItemTask: Send + Sync {
    async fn generate(&self, descriptor: &ItemDescriptor) -> Result<ItemPayload, StudioError>;

    /// Stage name for logging ("storyboard_shot", "pose_variant")
    fn stage(&self) -> &'static str;
}

/// Pull the first inline image out of a response and canonicalise it.
pub fn extract_image(response: &ContentResponse) -> Result<DataUri, StudioError> {
    let (mime_type, data) = response
        .inline_data()
        .ok_or_else(|| StudioError::EmptyResponse(format!("no image: {}", response.describe_empty())))?;
    Ok(DataUri::canonicalize(Some(mime_type), data)?)
}

/// Wraps an [`ItemTask`] so that every error stays inside the item boundary.
pub struct TaskRunner<T> {
    task: T,
    item_timeout: Option<Duration>,
}

impl<T: ItemTask> TaskRunner<T> {
    pub fn new(task: T) -> Self {
        Self {
            task,
            item_timeout: None,
        }
    }

    pub fn with_item_timeout(task: T, item_timeout: Option<Duration>) -> Self {
        Self { task, item_timeout }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn stage(&self) -> &'static str {
        self.task.stage()
    }

    /// Run one descriptor. Never returns an error: failures become `Failure`.
    pub async fn run(&self, descriptor: &ItemDescriptor) -> GenerationOutcome {
        let id = descriptor.id;
        let started = Instant::now();
        let result = match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.task.generate(descriptor)).await {
                Ok(result) => result,
                Err(_) => Err(StudioError::Timeout(format!(
                    "item {} exceeded {}s",
                    id,
                    limit.as_secs_f32()
                ))),
            },
            None => self.task.generate(descriptor).await,
        };

        match result.and_then(validate_payload) {
            Ok(payload) => {
                debug!(
                    stage = self.task.stage(),
                    item_id = %id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    mime_type = payload.image.mime_type(),
                    "Item generated"
                );
                GenerationOutcome::Success { id, payload }
            }
            Err(err) => {
                warn!(
                    stage = self.task.stage(),
                    item_id = %id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Item generation failed"
                );
                GenerationOutcome::Failure {
                    id,
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn validate_payload(payload: ItemPayload) -> Result<ItemPayload, StudioError> {
    if payload.image.is_empty() {
        return Err(StudioError::EmptyResponse("image payload is empty".to_string()));
    }
    Ok(payload)
}
