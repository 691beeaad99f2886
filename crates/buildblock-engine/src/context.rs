//! Block handler context.
//!
//! Provides file access, source location, the active environment and the
//! template engine to block handlers.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde_json::{Map, Value};

use crate::error::Location;
use crate::template::{DelimiterTemplate, TemplateEngine};
use crate::transform::{AssetTransform, PassthroughTransform};

/// File reading callback shared by the processor and its handlers.
pub type ReadFileFn = dyn Fn(&Path) -> io::Result<String> + Send + Sync;

static PASSTHROUGH: PassthroughTransform = PassthroughTransform;
static DEFAULT_TEMPLATE: LazyLock<DelimiterTemplate> = LazyLock::new(DelimiterTemplate::default);
static NO_DATA: Value = Value::Null;

/// Context handed to a [`BlockHandler`](crate::BlockHandler) for one block.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use buildblock_engine::BlockContext;
///
/// let read = |path: &Path| std::fs::read_to_string(path);
/// let ctx = BlockContext::new(Path::new("src"), &read).with_line(12);
///
/// assert_eq!(ctx.resolve_path("partials/nav.html"), Path::new("src/partials/nav.html"));
/// assert_eq!(ctx.location().line, 12);
/// ```
pub struct BlockContext<'a> {
    /// File containing the block, if the text came from a file.
    pub source_path: Option<&'a Path>,
    /// Directory relative paths are resolved against.
    pub base_dir: &'a Path,
    /// Line of the open directive (1-indexed).
    pub line: usize,
    /// Active environment label.
    pub environment: Option<&'a str>,
    /// Opaque host/path settings passed through from the invocation.
    pub config: Option<&'a Map<String, Value>>,
    /// Callback to read a file.
    pub read_file: &'a ReadFileFn,
    /// Transform applied to inlined assets.
    pub transform: &'a dyn AssetTransform,
    /// Template engine for handlers that render block content.
    pub template: &'a dyn TemplateEngine,
    /// Data model the template engine renders with.
    pub data: &'a Value,
    warnings: Vec<String>,
}

impl<'a> BlockContext<'a> {
    /// Create a context with no source file, no environment, no template data
    /// and the passthrough asset transform.
    #[must_use]
    pub fn new(base_dir: &'a Path, read_file: &'a ReadFileFn) -> Self {
        Self {
            source_path: None,
            base_dir,
            line: 1,
            environment: None,
            config: None,
            read_file,
            transform: &PASSTHROUGH,
            template: &*DEFAULT_TEMPLATE,
            data: &NO_DATA,
            warnings: Vec::new(),
        }
    }

    /// Set the source file.
    #[must_use]
    pub fn with_source_path(mut self, source_path: Option<&'a Path>) -> Self {
        self.source_path = source_path;
        self
    }

    /// Set the directive line.
    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Set the active environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Option<&'a str>) -> Self {
        self.environment = environment;
        self
    }

    /// Set the pass-through config mapping.
    #[must_use]
    pub fn with_config(mut self, config: &'a Map<String, Value>) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the asset transform.
    #[must_use]
    pub fn with_transform(mut self, transform: &'a dyn AssetTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the template engine and its data model.
    #[must_use]
    pub fn with_template(mut self, template: &'a dyn TemplateEngine, data: &'a Value) -> Self {
        self.template = template;
        self.data = data;
        self
    }

    /// Render `text` with the template engine, recording unknown keys as
    /// warnings.
    pub fn render_template(&mut self, text: &str) -> String {
        let mut warnings = Vec::new();
        let rendered = self.template.render(text, self.data, &mut warnings);
        for warning in warnings {
            self.warn(warning);
        }
        rendered
    }

    /// Location of the directive being handled.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(self.source_path, self.line)
    }

    /// Resolve a relative path against the base directory.
    #[must_use]
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }

    /// Read a file using the context's `read_file` callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(&self, path: &Path) -> io::Result<String> {
        (self.read_file)(path)
    }

    /// Look up a pass-through config value.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&'a Value> {
        self.config.and_then(|config| config.get(key))
    }

    /// Record a non-fatal problem with this block.
    pub fn warn(&mut self, message: impl AsRef<str>) {
        let location = self.location();
        tracing::warn!(location = %location, "{}", message.as_ref());
        self.warnings.push(format!("{location}: {}", message.as_ref()));
    }

    /// Warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
