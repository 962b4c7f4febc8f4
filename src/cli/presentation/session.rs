//! Live session report presentation.

use super::to_pretty_json;
use crate::live::{SessionEnd, SessionReport};
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::Path;

pub fn format_session_report(report: &SessionReport, output: &Path, format: &str) -> String {
    if format == "json" {
        return to_pretty_json(&json!({ "session": report, "output": output }));
    }
    let transitions: Vec<String> = report.transitions.iter().map(|s| s.to_string()).collect();
    let end = match &report.end {
        SessionEnd::Stopped => "stopped by user".yellow().to_string(),
        SessionEnd::Completed => "completed".green().to_string(),
        SessionEnd::Failed(e) => format!("{}", e.red()),
    };
    let mut out = format!(
        "Session: {}\n  States: {}\n  Frames sent: {}\n  Frames received: {}\n  Turns: {}\n  Interruptions: {}",
        end,
        transitions.join(" -> "),
        report.frames_sent,
        report.frames_received,
        report.turns,
        report.interruptions
    );
    if let (Some(first), Some(last)) = (report.playback.first(), report.playback.last()) {
        out.push_str(&format!(
            "\n  Playback: {:.2}s to {:.2}s",
            first.start.as_secs_f64(),
            last.end.as_secs_f64()
        ));
    }
    out.push_str(&format!("\n  Reply audio: {}", output.display()));
    out
}
