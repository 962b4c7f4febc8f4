//! Builder defaults seeded beneath every file and environment source.

use crate::config::default_voice;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("generation.reference_policy", "degrade")?
        .set_default("audio.voice", default_voice())?
        .set_default("logging.level", "info")
}
