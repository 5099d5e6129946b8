//! Built-in model catalog
//!
//! The catalog is the fixed set of backend model identifiers the session may
//! select. Selection UI lives outside the core; the session only ever holds a
//! [`ModelId`] that has been validated against this list.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub display_name: &'static str,
}

pub const BUILTIN_MODELS: &[CatalogEntry] = &[
    CatalogEntry {
        id: "gpt-4",
        display_name: "GPT-4",
    },
    CatalogEntry {
        id: "gpt-3.5-turbo",
        display_name: "GPT-3.5 Turbo",
    },
    CatalogEntry {
        id: "claude-2",
        display_name: "Claude 2",
    },
    CatalogEntry {
        id: "claude-instant",
        display_name: "Claude Instant",
    },
    CatalogEntry {
        id: "palm-2",
        display_name: "PaLM 2",
    },
    CatalogEntry {
        id: "llama-2-70b",
        display_name: "Llama 2 70B",
    },
    CatalogEntry {
        id: "llama-2-13b",
        display_name: "Llama 2 13B",
    },
    CatalogEntry {
        id: "cohere-command",
        display_name: "Command",
    },
    CatalogEntry {
        id: "mistral-7b",
        display_name: "Mistral 7B",
    },
];

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Find a catalog entry by ID (case-insensitive)
pub fn find_model(id: &str) -> Option<&'static CatalogEntry> {
    let id = id.trim();
    BUILTIN_MODELS
        .iter()
        .find(|entry| entry.id.eq_ignore_ascii_case(id))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model '{0}' (run `devdoc models` to list available models)")]
pub struct UnknownModel(pub String);

/// A model identifier known to belong to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(&'static CatalogEntry);

impl ModelId {
    pub fn parse(id: &str) -> Result<Self, UnknownModel> {
        find_model(id)
            .map(ModelId)
            .ok_or_else(|| UnknownModel(id.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0.id
    }

    pub fn display_name(&self) -> &'static str {
        self.0.display_name
    }
}

impl Default for ModelId {
    fn default() -> Self {
        let entry = find_model(DEFAULT_MODEL).unwrap_or(&BUILTIN_MODELS[0]);
        ModelId(entry)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ModelId {
    type Error = UnknownModel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_in_catalog() {
        assert_eq!(ModelId::default().as_str(), "gpt-3.5-turbo");
    }

    #[test]
    fn parse_is_case_insensitive_and_canonicalizes() {
        let model = ModelId::parse(" GPT-4 ").expect("known model");
        assert_eq!(model.as_str(), "gpt-4");
        assert_eq!(model.display_name(), "GPT-4");
    }

    #[test]
    fn unknown_models_are_rejected() {
        let err = ModelId::parse("gpt-9").unwrap_err();
        assert_eq!(err, UnknownModel("gpt-9".into()));
        assert!(err.to_string().contains("devdoc models"));
    }

    #[test]
    fn catalog_ids_are_unique() {
        let mut ids: Vec<_> = BUILTIN_MODELS.iter().map(|entry| entry.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BUILTIN_MODELS.len());
    }

    #[test]
    fn model_ids_deserialize_through_validation() {
        let model: ModelId = serde_json::from_str("\"claude-2\"").expect("valid");
        assert_eq!(model.as_str(), "claude-2");
        assert!(serde_json::from_str::<ModelId>("\"nope\"").is_err());
    }
}
