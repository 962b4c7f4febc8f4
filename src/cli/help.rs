//! CLI command-name contract for logging and routing.

use crate::cli::parse::{Commands, ConfigCommands};

/// Command name string for log spans (e.g. "storyboard", "config.show").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Storyboard { .. } => "storyboard".to_string(),
        Commands::Edit { .. } => "edit".to_string(),
        Commands::Speak { .. } => "speak".to_string(),
        Commands::Video { .. } => "video".to_string(),
        Commands::Live { .. } => "live".to_string(),
        Commands::Config { command } => format!("config.{}", config_command_name(command)),
    }
}

pub fn config_command_name(command: &ConfigCommands) -> &'static str {
    match command {
        ConfigCommands::Show { .. } => "show",
        ConfigCommands::Validate { .. } => "validate",
    }
}
