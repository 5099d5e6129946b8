use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::catalog::ModelId;
use crate::core::config::io::ConfigError;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend chat endpoint the relay posts to
    pub endpoint: Option<String>,
    /// Catalog id used for new sessions
    pub default_model: Option<String>,
    /// Seeded as the first message of a session; empty disables seeding
    pub system_prompt: Option<String>,
    /// Whole-request timeout for relay calls, in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Keys accepted by `devdoc set` and `devdoc unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Endpoint,
    DefaultModel,
    SystemPrompt,
    RequestTimeout,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::Endpoint,
        ConfigKey::DefaultModel,
        ConfigKey::SystemPrompt,
        ConfigKey::RequestTimeout,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Endpoint => "endpoint",
            ConfigKey::DefaultModel => "default-model",
            ConfigKey::SystemPrompt => "system-prompt",
            ConfigKey::RequestTimeout => "request-timeout",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownKey(value.to_string()))
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

/// Accepts absolute `http` and `https` URLs only.
pub fn validate_endpoint(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        value: trimmed.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(trimmed).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

pub fn validate_timeout(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidTimeout(value.trim().to_string())),
    }
}

impl Config {
    /// Validate and store `value` under `key`.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        match key {
            ConfigKey::Endpoint => self.endpoint = Some(validate_endpoint(value)?),
            ConfigKey::DefaultModel => {
                let model = ModelId::parse(value)?;
                self.default_model = Some(model.as_str().to_string());
            }
            ConfigKey::SystemPrompt => self.system_prompt = Some(value.trim().to_string()),
            ConfigKey::RequestTimeout => self.request_timeout_secs = Some(validate_timeout(value)?),
        }
        Ok(())
    }

    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Endpoint => self.endpoint = None,
            ConfigKey::DefaultModel => self.default_model = None,
            ConfigKey::SystemPrompt => self.system_prompt = None,
            ConfigKey::RequestTimeout => self.request_timeout_secs = None,
        }
    }
}
