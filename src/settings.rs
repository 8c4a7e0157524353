use config::Config;
use serde::Deserialize;
use std::time::Duration;

use crate::ParserConfig;

/// File-backed form of [`ParserConfig`]. Missing keys keep the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ParserSettings {
    pub buffer_size: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_buffer_size: Option<usize>,
}

impl From<ParserSettings> for ParserConfig {
    fn from(settings: ParserSettings) -> Self {
        let defaults = ParserConfig::default();
        ParserConfig {
            buffer_size: settings.buffer_size.unwrap_or(defaults.buffer_size),
            timeout: settings.timeout_ms.map(Duration::from_millis).or(defaults.timeout),
            max_buffer_size: settings.max_buffer_size.or(defaults.max_buffer_size),
        }
    }
}

/// Loads parser settings from a file; the format follows the extension.
pub fn load_config(path: &str) -> Result<ParserSettings, config::ConfigError> {
    let settings = Config::builder()
        .add_source(config::File::with_name(path))
        .build()?;

    settings.try_deserialize()
}
