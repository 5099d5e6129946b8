use crate::core::config::data::Config;
use crate::core::config::io::ConfigError;
use crate::core::config::settings::{Overrides, Settings};

fn origin(from_flag: bool, from_file: bool) -> &'static str {
    if from_flag {
        " (command line)"
    } else if from_file {
        ""
    } else {
        " (default)"
    }
}

impl Config {
    /// Render the settings a chat would run with, noting where each value
    /// came from.
    pub fn render_resolved(&self, overrides: &Overrides) -> Result<String, ConfigError> {
        let settings = Settings::resolve(self, overrides)?;
        let prompt = settings
            .system_prompt
            .unwrap_or_else(|| "(disabled)".to_string());
        let timeout = match settings.request_timeout {
            Some(timeout) => format!("{}s", timeout.as_secs()),
            None => "none".to_string(),
        };

        let mut out = String::from("Current configuration:\n");
        out.push_str(&format!(
            "  endpoint: {}{}\n",
            settings.endpoint,
            origin(overrides.endpoint.is_some(), self.endpoint.is_some())
        ));
        out.push_str(&format!(
            "  default-model: {}{}\n",
            settings.model,
            origin(overrides.model.is_some(), self.default_model.is_some())
        ));
        out.push_str(&format!(
            "  system-prompt: {}{}\n",
            prompt,
            origin(false, self.system_prompt.is_some())
        ));
        out.push_str(&format!(
            "  request-timeout: {}{}\n",
            timeout,
            origin(false, self.request_timeout_secs.is_some())
        ));
        Ok(out)
    }

    pub fn print_resolved(&self, overrides: &Overrides) -> Result<(), ConfigError> {
        print!("{}", self.render_resolved(overrides)?);
        Ok(())
    }
}
