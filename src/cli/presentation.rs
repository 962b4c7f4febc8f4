//! CLI presentation: text and json formatters per command family.

mod config;
mod media;
mod run;
mod session;

pub use config::{format_config_show, format_config_validation};
pub use media::{format_speech_result, format_video_result, SpeechSummary, VideoSummary};
pub use run::{format_run_json, format_run_text, run_rows, RunRow};
pub use session::format_session_report;

pub(crate) fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
