//! Prompt templates with `{{ name }}` placeholders.

use agentkit_extraction::message::Message;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use crate::errors::TemplateError;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static pattern compiles")
});

/// A text template whose placeholders are filled at render time.
///
/// Rendering is strict: every placeholder must be bound, either through
/// [`partial`](Self::partial) or the variables passed to [`render`](Self::render).
///
/// # Example
///
/// ```
/// use agentkit_provider::prompts::PromptTemplate;
/// use std::collections::HashMap;
///
/// let template = PromptTemplate::new("Extract {{ field }} from: {{text}}").partial("field", "dates");
/// let vars = HashMap::from([("text".to_string(), "due 2024-05-01".to_string())]);
/// assert_eq!(template.render(&vars).unwrap(), "Extract dates from: due 2024-05-01");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    bound: BTreeMap<String, String>,
}

impl PromptTemplate {
    /// Creates a template from a string.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            bound: BTreeMap::new(),
        }
    }

    /// Reads a UTF-8 template file.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Io`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(event = "template_loaded", path = %path.display(), chars = source.chars().count());
        Ok(Self::new(source))
    }

    /// Placeholder names in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.source) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Pre-binds a variable; later bindings of the same name win.
    #[must_use]
    pub fn partial(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bound.insert(name.into(), value.into());
        self
    }

    /// Fills every placeholder. `vars` take precedence over partial bindings.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unbound`] listing every placeholder without a value.
    pub fn render(&self, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
        let missing: Vec<String> = self
            .placeholders()
            .into_iter()
            .filter(|name| !vars.contains_key(*name) && !self.bound.contains_key(*name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(TemplateError::Unbound(missing));
        }

        let rendered = PLACEHOLDER.replace_all(&self.source, |caps: &Captures<'_>| {
            let name = &caps[1];
            vars.get(name)
                .or_else(|| self.bound.get(name))
                .cloned()
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }

    /// Renders the template as a system message.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unbound`] as [`render`](Self::render).
    pub fn system_message(&self, vars: &HashMap<String, String>) -> Result<Message, TemplateError> {
        self.render(vars).map(Message::system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_deduplicated_in_order() {
        let template = PromptTemplate::new("{{b}} {{ a }} {{b}}");
        assert_eq!(template.placeholders(), vec!["b", "a"]);
    }

    #[test]
    fn test_unbound_placeholders_reported() {
        let err = PromptTemplate::new("{{a}} {{b}}").render(&HashMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Unbound(ref names) if names == &["a", "b"]));
    }

    #[test]
    fn test_vars_override_partials() {
        let template = PromptTemplate::new("{{x}}").partial("x", "partial");
        let vars = HashMap::from([("x".to_string(), "call".to_string())]);
        assert_eq!(template.render(&vars).unwrap(), "call");
    }

    #[test]
    fn test_text_without_placeholders_renders_verbatim() {
        let template = PromptTemplate::new("Reply with ```json {\"a\": 1}``` only.");
        assert_eq!(
            template.render(&HashMap::new()).unwrap(),
            "Reply with ```json {\"a\": 1}``` only."
        );
    }
}
