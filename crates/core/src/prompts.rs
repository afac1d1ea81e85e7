//! Prompt templates with optional on-disk overrides
//!
//! Every stage ships a built-in template. A file `<dir>/<name>.md` replaces it
//! when present. Templates use `{{NAME}}` placeholders; `{{TODAY}}` is always
//! available.

use anyhow::{anyhow, Result};
use chrono::Local;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid regex"))
}

/// Substitute `{{name}}` placeholders; a placeholder without a value is an error
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let today = Local::now().format("%Y-%m-%d").to_string();
    let mut result = template.to_string();

    for cap in placeholder_regex().captures_iter(template) {
        let full_match = &cap[0];
        let name = &cap[1];

        let value = if name == "TODAY" {
            today.as_str()
        } else {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| anyhow!("Missing template variable: {}", name))?
        };

        result = result.replace(full_match, value);
    }

    Ok(result)
}

/// Source of prompt templates
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Built-in templates only
    pub fn builtin() -> Self {
        Self { dir: None }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Override file contents for `name`, else the built-in template
    pub fn template(&self, name: &str, fallback: &str) -> String {
        let Some(ref dir) = self.dir else {
            return fallback.to_string();
        };
        let path = dir.join(format!("{}.md", name));
        if !path.exists() {
            return fallback.to_string();
        }
        match fs::read_to_string(&path) {
            Ok(content) => {
                tracing::debug!("Loaded prompt override from {}", path.display());
                content
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}, using built-in prompt", path.display(), e);
                fallback.to_string()
            }
        }
    }

    /// Render `name`, falling back to the built-in template when an override
    /// references a variable the caller does not supply
    pub fn render(&self, name: &str, fallback: &str, vars: &[(&str, &str)]) -> String {
        let template = self.template(name, fallback);
        match render(&template, vars) {
            Ok(rendered) => rendered,
            Err(e) => {
                if template != fallback {
                    tracing::warn!("Prompt override '{}' unusable ({}), using built-in", name, e);
                }
                // Built-in templates only reference supplied variables
                render(fallback, vars).unwrap_or_else(|_| fallback.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_vars() {
        let out = render("Classify: \"{{query}}\" ({{query}})", &[("query", "hi")]).unwrap();
        assert_eq!(out, "Classify: \"hi\" (hi)");
    }

    #[test]
    fn test_render_missing_var_is_error() {
        let err = render("{{missing}}", &[]).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_render_today() {
        let out = render("Today is {{TODAY}}", &[]).unwrap();
        assert!(!out.contains("{{TODAY}}"));
        assert_eq!(out.len(), "Today is ".len() + 10);
    }

    #[test]
    fn test_builtin_library_uses_fallback() {
        let lib = PromptLibrary::builtin();
        assert_eq!(lib.template("classifier", "fallback"), "fallback");
        assert_eq!(lib.render("classifier", "Q: {{query}}", &[("query", "x")]), "Q: x");
    }

    #[test]
    fn test_override_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("classifier.md"), "Custom {{query}}").unwrap();
        let lib = PromptLibrary::with_dir(dir.path());
        assert_eq!(lib.render("classifier", "Q: {{query}}", &[("query", "x")]), "Custom x");
        assert_eq!(lib.template("planner", "built-in"), "built-in");
    }

    #[test]
    fn test_broken_override_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("classifier.md"), "Custom {{unknown}}").unwrap();
        let lib = PromptLibrary::with_dir(dir.path());
        assert_eq!(lib.render("classifier", "Q: {{query}}", &[("query", "x")]), "Q: x");
    }
}
