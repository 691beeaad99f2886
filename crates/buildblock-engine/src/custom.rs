//! Declarative custom block types.
//!
//! A handler source is a TOML file declaring one or more block types:
//!
//! ```toml
//! [[block]]
//! name = "banner"
//! action = "replace"
//! template = "<div class=\"banner\">{args}</div>"
//!
//! [[block]]
//! name = "section"
//! action = "wrap"
//! before = "<section>"
//! after = "</section>"
//!
//! [[block]]
//! name = "cdn"
//! action = "regex"
//! pattern = "src=\"lib/"
//! replacement = "src=\"https://cdn.example.com/lib/"
//! ```
//!
//! `replace` templates may use `{content}`, `{args}`, `{type}` and
//! `{environment}`. `regex` replacements may use capture groups (`$1`).

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::context::{BlockContext, ReadFileFn};
use crate::error::ProcessError;
use crate::grammar::{Directive, is_valid_block_type};
use crate::handler::BlockHandler;
use crate::output::BlockOutput;

static TEMPLATE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(content|args|type|environment)\}").unwrap());

/// Error loading a custom handler source.
#[derive(Debug, thiserror::Error)]
pub enum HandlerSourceError {
    /// Source file could not be read.
    #[error("Failed to read block type source {}: {source}", path.display())]
    Read {
        /// Source path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Source is not valid TOML or does not match the expected shape.
    #[error("Failed to parse block type source {}: {source}", path.display())]
    Parse {
        /// Source path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A declared block type is incomplete or inconsistent.
    #[error("Invalid block type source {}: {message}", path.display())]
    Invalid {
        /// Source path.
        path: PathBuf,
        /// What is wrong.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceFile {
    #[serde(default)]
    block: Vec<BlockSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BlockSpec {
    name: String,
    action: ActionKind,
    before: Option<String>,
    after: Option<String>,
    template: Option<String>,
    pattern: Option<String>,
    replacement: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ActionKind {
    Wrap,
    Replace,
    Regex,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wrap => "wrap",
            Self::Replace => "replace",
            Self::Regex => "regex",
        })
    }
}

#[derive(Clone, Debug)]
enum Action {
    Wrap { before: String, after: String },
    Replace { template: String },
    Regex { pattern: Regex, replacement: String },
}

/// Block handler declared in a handler source.
#[derive(Clone, Debug)]
pub struct DeclarativeHandler {
    name: String,
    action: Action,
}

impl DeclarativeHandler {
    /// Create a handler wrapping block content in `before` and `after`.
    #[must_use]
    pub fn wrap(name: impl Into<String>, before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: Action::Wrap {
                before: before.into(),
                after: after.into(),
            },
        }
    }

    /// Create a handler replacing the block with a filled-in template.
    #[must_use]
    pub fn replace(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: Action::Replace {
                template: template.into(),
            },
        }
    }

    /// Create a handler applying a regex replacement to the block content.
    #[must_use]
    pub fn regex(name: impl Into<String>, pattern: Regex, replacement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: Action::Regex {
                pattern,
                replacement: replacement.into(),
            },
        }
    }
}

impl BlockHandler for DeclarativeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(
        &self,
        content: &str,
        directive: &Directive,
        ctx: &mut BlockContext,
    ) -> Result<BlockOutput, ProcessError> {
        Ok(match &self.action {
            Action::Wrap { before, after } => {
                BlockOutput::Rewrite(format!("{before}{content}{after}"))
            }
            Action::Replace { template } => {
                let filled = TEMPLATE_PLACEHOLDER.replace_all(template, |caps: &Captures| {
                    match &caps[1] {
                        "content" => content,
                        "args" => directive.args.as_str(),
                        "type" => directive.block_type.as_str(),
                        _ => ctx.environment.unwrap_or_default(),
                    }
                });
                BlockOutput::Replace(filled.into_owned())
            }
            Action::Regex {
                pattern,
                replacement,
            } => BlockOutput::Rewrite(
                pattern
                    .replace_all(content, replacement.as_str())
                    .into_owned(),
            ),
        })
    }
}

/// Read and validate a handler source.
///
/// # Errors
///
/// Returns an error if the source cannot be read, is not valid TOML, or declares
/// an invalid block type.
pub fn load_handler_source(
    path: &Path,
    read_file: &ReadFileFn,
) -> Result<Vec<Arc<dyn BlockHandler>>, HandlerSourceError> {
    let text = read_file(path).map_err(|source| HandlerSourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_handler_source(&text, path)
}

/// Validate handler source text. `path` is only used in errors.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML or declares an invalid block
/// type. Nothing from a source is usable once one of its entries fails.
pub fn parse_handler_source(
    text: &str,
    path: &Path,
) -> Result<Vec<Arc<dyn BlockHandler>>, HandlerSourceError> {
    let source: SourceFile = toml::from_str(text).map_err(|source| HandlerSourceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |message: String| HandlerSourceError::Invalid {
        path: path.to_path_buf(),
        message,
    };

    if source.block.is_empty() {
        return Err(invalid("no [[block]] entries".to_owned()));
    }

    let mut seen = HashSet::new();
    let mut handlers: Vec<Arc<dyn BlockHandler>> = Vec::with_capacity(source.block.len());
    for (i, spec) in source.block.into_iter().enumerate() {
        let label = format!("block {} (`{}`)", i + 1, spec.name);
        if !is_valid_block_type(&spec.name) {
            return Err(invalid(format!("{label}: invalid block type name")));
        }
        if !seen.insert(spec.name.clone()) {
            return Err(invalid(format!("{label}: declared more than once")));
        }
        let handler = build_handler(spec).map_err(|message| invalid(format!("{label}: {message}")))?;
        handlers.push(Arc::new(handler));
    }
    Ok(handlers)
}

fn build_handler(spec: BlockSpec) -> Result<DeclarativeHandler, String> {
    let BlockSpec {
        name,
        action,
        before,
        after,
        template,
        pattern,
        replacement,
    } = spec;

    let unused = |field: &str, value: &Option<String>| {
        if value.is_some() {
            Err(format!("`{field}` is not used by action `{action}`"))
        } else {
            Ok(())
        }
    };

    match action {
        ActionKind::Wrap => {
            unused("template", &template)?;
            unused("pattern", &pattern)?;
            unused("replacement", &replacement)?;
            if before.is_none() && after.is_none() {
                return Err("action `wrap` requires `before` or `after`".to_owned());
            }
            Ok(DeclarativeHandler::wrap(
                name,
                before.unwrap_or_default(),
                after.unwrap_or_default(),
            ))
        }
        ActionKind::Replace => {
            unused("before", &before)?;
            unused("after", &after)?;
            unused("pattern", &pattern)?;
            unused("replacement", &replacement)?;
            let template = template.ok_or("action `replace` requires `template`")?;
            Ok(DeclarativeHandler::replace(name, template))
        }
        ActionKind::Regex => {
            unused("before", &before)?;
            unused("after", &after)?;
            unused("template", &template)?;
            let pattern = pattern.ok_or("action `regex` requires `pattern`")?;
            let replacement = replacement.ok_or("action `regex` requires `replacement`")?;
            let pattern = Regex::new(&pattern).map_err(|e| format!("invalid pattern: {e}"))?;
            Ok(DeclarativeHandler::regex(name, pattern, replacement))
        }
    }
}
