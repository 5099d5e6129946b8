//! Resolution of effective runtime settings.
//!
//! Command-line flags win over the config file, which wins over built-in
//! defaults.

use std::time::Duration;

use crate::core::catalog::ModelId;
use crate::core::config::data::{validate_endpoint, Config};
use crate::core::config::io::ConfigError;

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: String,
    pub model: ModelId,
    pub system_prompt: Option<String>,
    pub request_timeout: Option<Duration>,
}

impl Settings {
    pub fn resolve(config: &Config, overrides: &Overrides) -> Result<Self, ConfigError> {
        let endpoint = overrides
            .endpoint
            .as_deref()
            .unwrap_or_else(|| config.effective_endpoint());
        let model = overrides
            .model
            .as_deref()
            .unwrap_or_else(|| config.effective_model());

        Ok(Self {
            endpoint: validate_endpoint(endpoint)?,
            model: ModelId::parse(model)?,
            system_prompt: config.effective_system_prompt().map(str::to_string),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        })
    }
}
