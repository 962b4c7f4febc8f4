//! Fan-out run presentation: per-item table and run summary.

use super::to_pretty_json;
use crate::generation::{ItemStatus, RunReport, RunState};
use crate::types::ItemId;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct RunRow {
    pub id: ItemId,
    pub label: String,
    pub status: ItemStatus,
    /// Written file for loaded items, failure reason for failed ones
    pub detail: String,
}

/// One row per item in descriptor order.
pub fn run_rows(
    state: &RunState,
    labels: &HashMap<ItemId, String>,
    files: &HashMap<ItemId, PathBuf>,
) -> Vec<RunRow> {
    state
        .entries()
        .iter()
        .map(|entry| RunRow {
            id: entry.id,
            label: labels.get(&entry.id).cloned().unwrap_or_default(),
            status: entry.status,
            detail: match entry.status {
                ItemStatus::Loaded => files
                    .get(&entry.id)
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                ItemStatus::Failed => entry.failure.clone().unwrap_or_default(),
                ItemStatus::Pending => String::new(),
            },
        })
        .collect()
}

fn status_cell(status: ItemStatus) -> String {
    match status {
        ItemStatus::Loaded => "loaded".green().to_string(),
        ItemStatus::Failed => "failed".red().to_string(),
        ItemStatus::Pending => "pending".yellow().to_string(),
    }
}

pub fn format_run_text(title: &str, report: &RunReport, rows: &[RunRow]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Item", "Status", "Detail"]);
    for row in rows {
        table.add_row(vec![
            row.id.to_string(),
            row.label.clone(),
            status_cell(row.status),
            row.detail.clone(),
        ]);
    }

    let mut summary = format!(
        "{} loaded, {} failed of {} in {:.1}s ({})",
        report.loaded,
        report.failed,
        report.total,
        report.duration.as_secs_f64(),
        report.run_id
    );
    if report.superseded {
        summary.push_str(&format!(
            "; superseded by a newer run, {} results discarded",
            report.stale
        ));
    }
    format!("{}\n{}\n{}", title.bold().underline(), table, summary)
}

pub fn format_run_json(report: &RunReport, rows: &[RunRow], extra: Value) -> String {
    let mut out = json!({ "report": report, "items": rows });
    if let (Value::Object(target), Value::Object(extra)) = (&mut out, extra) {
        target.extend(extra);
    }
    to_pretty_json(&out)
}
