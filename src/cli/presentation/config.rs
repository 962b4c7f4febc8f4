//! Config command presentation.

use super::to_pretty_json;
use crate::config::{StudioConfig, ValidationError};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_config_show(config: &StudioConfig, format: &str) -> String {
    let key_status = if config.provider.require_api_key().is_ok() {
        "set"
    } else {
        "missing"
    };
    if format == "json" {
        return to_pretty_json(&json!({ "config": config, "api_key": key_status }));
    }
    let body = toml::to_string_pretty(config).unwrap_or_else(|e| format!("# unrenderable: {}", e));
    format!("# api_key: {}\n{}", key_status, body)
}

pub fn format_config_validation(result: &Result<(), Vec<ValidationError>>, format: &str) -> String {
    let errors: Vec<String> = match result {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };
    if format == "json" {
        return to_pretty_json(&json!({ "valid": errors.is_empty(), "errors": errors }));
    }
    if errors.is_empty() {
        return format!("{}", "Configuration is valid".green());
    }
    let mut out = format!("{} ({}):", "Configuration is invalid".red(), errors.len());
    for e in &errors {
        out.push_str(&format!("\n  - {}", e));
    }
    out
}
