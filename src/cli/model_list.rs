//! Model listing functionality

use crate::core::catalog::{CatalogEntry, BUILTIN_MODELS};

pub fn render_model_list(models: &[CatalogEntry], default_model: &str) -> String {
    let width = models.iter().map(|m| m.id.len()).max().unwrap_or(0);
    let mut out = String::from("Available models:\n");
    for model in models {
        let marker = if model.id.eq_ignore_ascii_case(default_model) {
            "*"
        } else {
            " "
        };
        out.push_str(&format!(
            "{marker} {:<width$}  {}\n",
            model.id,
            model.display_name,
            width = width
        ));
    }
    out.push_str("\n* default for new sessions\n");
    out
}

pub fn list_models(default_model: &str) {
    print!("{}", render_model_list(BUILTIN_MODELS, default_model));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_only_the_default_model() {
        let rendered = render_model_list(BUILTIN_MODELS, "claude-2");
        let marked: Vec<_> = rendered.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(marked.len(), 2);
        assert!(marked[0].contains("claude-2"));
        for entry in BUILTIN_MODELS {
            assert!(rendered.contains(entry.id));
        }
    }
}
