//! Script template rendering
//!
//! Templates use handlebars placeholders. A field may be written either as
//! `{{Image}}` or with a leading dot as `{{.Image}}`; both resolve the same
//! field. `{{- ` and ` -}}` trim surrounding whitespace like `{{~` and `~}}`,
//! and `\{{` emits a literal mustache. Rendering is strict (unknown fields
//! fail) and never escapes values.

use std::borrow::Cow;
use std::collections::BTreeMap;

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use crate::error::RenderError;

/// Field every script can reference for the target image
pub const IMAGE_FIELD: &str = "Image";

const SCRIPT_TEMPLATE: &str = "script";

/// Named values substituted into a script template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScriptParams {
    fields: BTreeMap<String, String>,
}

impl ScriptParams {
    /// Create params holding the `Image` field
    pub fn new(image: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(IMAGE_FIELD.to_string(), image.into());
        Self { fields }
    }

    /// Add or replace a field
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a field in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Value of a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Value of the `Image` field
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.get(IMAGE_FIELD)
    }
}

/// A parsed script template, ready to render any number of times
pub struct ScriptTemplate {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for ScriptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptTemplate").finish_non_exhaustive()
    }
}

impl ScriptTemplate {
    /// Parse template text
    ///
    /// # Errors
    /// Returns `RenderError::Parse` on malformed syntax
    pub fn parse(text: &str) -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(SCRIPT_TEMPLATE, normalize_field_refs(text))
            .map_err(|e| RenderError::Parse(e.to_string()))?;

        Ok(Self { registry })
    }

    /// Substitute `params` into the template
    ///
    /// # Errors
    /// Returns `RenderError::Render` if a placeholder names a field that
    /// `params` does not have
    pub fn render(&self, params: &ScriptParams) -> Result<String, RenderError> {
        let script = self
            .registry
            .render(SCRIPT_TEMPLATE, params)
            .map_err(|e| RenderError::Render(e.to_string()))?;

        debug!(bytes = script.len(), "rendered script");
        Ok(script)
    }
}

/// Parse `template` and render it with `params` in one step
///
/// # Errors
/// Returns `RenderError` if the template is malformed or references an
/// unknown field
pub fn render(template: &str, params: &ScriptParams) -> Result<String, RenderError> {
    ScriptTemplate::parse(template)?.render(params)
}

/// Rewrite `{{.Name}}` to `{{Name}}`, `{{.}}` to `{{this}}`, and the
/// `{{- ` / ` -}}` trim markers to handlebars `~`
///
/// Escaped mustaches (`\{{`) are left alone.
fn normalize_field_refs(template: &str) -> Cow<'_, str> {
    if !template.contains("{{") {
        return Cow::Borrowed(template);
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(idx) = rest.find("{{") {
        out.push_str(&rest[..idx]);
        let escaped = out.ends_with('\\');
        out.push_str("{{");
        rest = &rest[idx + 2..];

        if escaped {
            continue;
        }

        if let Some(after) = rest.strip_prefix('-') {
            if after.starts_with(char::is_whitespace) {
                out.push('~');
                rest = after;
            }
        }

        // triple-stash and whitespace control markers
        let body = rest.trim_start_matches(|c: char| c == '{' || c == '~');
        let body = body.trim_start();
        out.push_str(&rest[..rest.len() - body.len()]);
        rest = body;

        if let Some(field) = body.strip_prefix('.') {
            match field.chars().next() {
                Some(c) if c.is_alphabetic() || c == '_' => rest = field,
                Some(c) if c.is_whitespace() || c == '}' || c == '~' => {
                    out.push_str("this");
                    rest = field;
                }
                _ => {}
            }
        }

        if let Some(close) = rest.find("}}") {
            if let Some(head) = rest[..close].strip_suffix('-') {
                if head.ends_with(char::is_whitespace) {
                    out.push_str(head);
                    out.push_str("~}}");
                    rest = &rest[close + 2..];
                }
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}
