//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands, ConfigCommands};
pub use route::RunContext;
