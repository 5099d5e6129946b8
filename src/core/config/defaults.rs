use crate::core::catalog::DEFAULT_MODEL;
use crate::core::config::data::Config;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful DevDoc assistant.";

impl Config {
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn effective_model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// An explicitly empty prompt disables seeding; an unset one uses the default.
    pub fn effective_system_prompt(&self) -> Option<&str> {
        match self.system_prompt.as_deref() {
            Some(prompt) if prompt.trim().is_empty() => None,
            Some(prompt) => Some(prompt),
            None => Some(DEFAULT_SYSTEM_PROMPT),
        }
    }
}
