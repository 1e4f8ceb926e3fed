//! Variable substitution engine for templates

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::notification::TemplateVariables;

lazy_static! {
    /// `{{identifier}}` with identifier in `[A-Za-z0-9_]+`
    pub(crate) static ref VARIABLE_TOKEN: Regex =
        Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("variable token regex is valid");
}

/// Substitute `{{variable}}` placeholders in a template string.
///
/// Unknown or `null` variables render as an empty string. Anything that is
/// not a well-formed token (`{{ name }}`, `{{}}`, a lone `{{`) is copied to
/// the output unchanged.
pub fn render_variables(template: &str, variables: &TemplateVariables) -> String {
    VARIABLE_TOKEN
        .replace_all(template, |caps: &Captures<'_>| {
            variables
                .get(&caps[1])
                .map(stringify_value)
                .unwrap_or(Cow::Borrowed(""))
                .into_owned()
        })
        .into_owned()
}

fn stringify_value(value: &serde_json::Value) -> Cow<'_, str> {
    match value {
        serde_json::Value::String(s) => Cow::Borrowed(s.as_str()),
        serde_json::Value::Number(n) => Cow::Owned(n.to_string()),
        serde_json::Value::Bool(b) => Cow::Owned(b.to_string()),
        serde_json::Value::Null => Cow::Borrowed(""),
        // For arrays and objects, use JSON representation
        other => Cow::Owned(other.to_string()),
    }
}
