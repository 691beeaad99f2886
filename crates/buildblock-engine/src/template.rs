//! Template substitution applied to processed output.
//!
//! The default engine replaces placeholders matched by a delimiter regex (the
//! `interpolate` setting) with values from the data model. The first capture
//! group of the regex is the key, looked up as a dotted path (`site.title`,
//! `items.0`).

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

/// Default placeholder pattern: `<%= key %>`.
pub const DEFAULT_INTERPOLATE: &str = r"<%=([\s\S]+?)%>";

static DEFAULT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_INTERPOLATE).unwrap());

/// Error building a template engine.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Interpolate pattern is not a valid regex.
    #[error("Invalid interpolate pattern `{pattern}`: {source}")]
    Pattern {
        /// Pattern as configured.
        pattern: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// Interpolate pattern cannot capture a key.
    #[error("Interpolate pattern `{0}` has no capture group")]
    NoCaptureGroup(String),
}

/// Text substitution applied to each top-level output and to `template` blocks.
pub trait TemplateEngine: Send + Sync {
    /// Render `text` with `data`, recording non-fatal problems in `warnings`.
    fn render(&self, text: &str, data: &Value, warnings: &mut Vec<String>) -> String;
}

/// Placeholder substitution driven by a delimiter regex.
#[derive(Clone, Debug)]
pub struct DelimiterTemplate {
    pattern: Regex,
}

impl Default for DelimiterTemplate {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

impl DelimiterTemplate {
    /// Build an engine from an interpolate pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern does not compile or has no capture group.
    pub fn new(pattern: &str) -> Result<Self, TemplateError> {
        let regex = Regex::new(pattern).map_err(|source| TemplateError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        if regex.captures_len() < 2 {
            return Err(TemplateError::NoCaptureGroup(pattern.to_owned()));
        }
        Ok(Self { pattern: regex })
    }

    /// The interpolate pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl TemplateEngine for DelimiterTemplate {
    fn render(&self, text: &str, data: &Value, warnings: &mut Vec<String>) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                let key = caps.get(1).map_or("", |m| m.as_str().trim());
                match lookup(data, key) {
                    Some(value) => display_value(value),
                    None => {
                        tracing::warn!(key, "Unknown template key");
                        warnings.push(format!("unknown template key `{key}`"));
                        caps[0].to_owned()
                    }
                }
            })
            .into_owned()
    }
}

/// Resolve a dotted key path in the data model.
fn lookup<'v>(data: &'v Value, key: &str) -> Option<&'v Value> {
    if key.is_empty() {
        return None;
    }
    key.split('.').try_fold(data, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn render(engine: &DelimiterTemplate, text: &str, data: &Value) -> (String, Vec<String>) {
        let mut warnings = Vec::new();
        let out = engine.render(text, data, &mut warnings);
        (out, warnings)
    }

    #[test]
    fn test_default_delimiters() {
        let data = json!({ "message": "hello", "count": 3 });
        let (out, warnings) = render(
            &DelimiterTemplate::default(),
            "<p><%= message %></p><i><%=count%></i>",
            &data,
        );
        assert_eq!(out, "<p>hello</p><i>3</i>");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_custom_delimiters() {
        let engine = DelimiterTemplate::new(r"\{\{([\s\S]+?)\}\}").unwrap();
        let (out, _) = render(&engine, "{{ name }} <%= name %>", &json!({ "name": "x" }));
        assert_eq!(out, "x <%= name %>");
    }

    #[test]
    fn test_dotted_paths() {
        let data = json!({ "site": { "title": "Docs" }, "items": ["a", "b"] });
        let (out, _) = render(
            &DelimiterTemplate::default(),
            "<%= site.title %>/<%= items.1 %>",
            &data,
        );
        assert_eq!(out, "Docs/b");
    }

    #[test]
    fn test_unknown_key_left_untouched() {
        let (out, warnings) = render(
            &DelimiterTemplate::default(),
            "a <%= missing %> b",
            &json!({}),
        );
        assert_eq!(out, "a <%= missing %> b");
        assert_eq!(warnings, vec!["unknown template key `missing`"]);
    }

    #[test]
    fn test_values_are_literal() {
        let data = json!({ "v": "$0 and $1" });
        let (out, _) = render(&DelimiterTemplate::default(), "<%= v %>", &data);
        assert_eq!(out, "$0 and $1");
    }

    #[test]
    fn test_non_string_values() {
        let data = json!({ "flag": true, "none": null, "list": [1, 2] });
        let (out, _) = render(
            &DelimiterTemplate::default(),
            "<%= flag %>|<%= none %>|<%= list %>",
            &data,
        );
        assert_eq!(out, "true||[1,2]");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            DelimiterTemplate::new("(unclosed"),
            Err(TemplateError::Pattern { .. })
        ));
        assert!(matches!(
            DelimiterTemplate::new(r"\{\{.+?\}\}"),
            Err(TemplateError::NoCaptureGroup(_))
        ));
    }
}
