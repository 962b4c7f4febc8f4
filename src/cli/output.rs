//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::StudioError;

/// Map domain errors to a single user-facing line. Preflight problems are
/// reported once, as the only message of the run.
pub fn map_error(e: &StudioError) -> String {
    if e.is_preflight() {
        format!("Cannot start: {}", e)
    } else {
        e.to_string()
    }
}

/// Exit code for a failed command.
pub fn exit_code(e: &StudioError) -> i32 {
    match e {
        StudioError::ConfigError(_) => 2,
        _ if e.is_preflight() => 3,
        StudioError::Session(_) => 4,
        _ => 1,
    }
}
