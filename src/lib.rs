//! Shotlist: Parallel Generation Orchestration
//!
//! Fans out independent image generation requests (a 12-shot storyboard or 8 pose
//! variants), tracks every item's state under a run identifier, isolates per-item
//! failures, and reassembles results keyed by item id. Also drives speech, video and
//! realtime voice sessions against the same hosted generative collaborator.

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod live;
pub mod logging;
pub mod media;
pub mod pose;
pub mod provider;
pub mod speech;
pub mod storyboard;
pub mod types;
pub mod video;

pub use error::{MediaError, SessionError, StudioError};
pub use types::{ItemId, RunId};
