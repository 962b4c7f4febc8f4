//! Parallel fan-out generation: descriptors, task runner, coordinator and reconciler.
//! Shared by the storyboard-shot stage and the pose-variant stage.

pub mod coordinator;
pub mod descriptor;
pub mod outcome;
pub mod preflight;
pub mod runner;
pub mod state;

pub use coordinator::{ApplyResult, FanOutCoordinator, RunReport, RunTicket};
pub use descriptor::ItemDescriptor;
pub use outcome::{GenerationOutcome, ItemPayload, VideoPromptConfig, VideoPromptDocument};
pub use preflight::{CheckedReferences, ReferenceInputs, ReferencePolicy};
pub use runner::{extract_image, ItemTask, TaskRunner};
pub use state::{reconcile, ItemEntry, ItemStatus, RunState};
