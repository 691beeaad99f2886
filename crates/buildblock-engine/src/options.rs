//! Processing options.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::grammar::DEFAULT_MARKER;
use crate::template::DEFAULT_INTERPOLATE;

/// Default limit on nested includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Options for one processing run.
///
/// Deserializable from the `[options]` table of `buildblock.toml`; every field
/// has a default.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessOptions {
    /// Template data model.
    pub data: Map<String, Value>,
    /// Active environment label.
    pub environment: Option<String>,
    /// Comment marker keyword.
    ///
    /// Default: `build`
    pub comment_marker: String,
    /// Remove every `remove` block regardless of its targets.
    pub strip: bool,
    /// Re-process included files.
    pub recursive: bool,
    /// Maximum include nesting before an include is reported as a cycle.
    ///
    /// Default: 32
    pub max_include_depth: usize,
    /// Declarative handler sources to register, in order.
    pub custom_block_types: Vec<PathBuf>,
    /// Template delimiter settings.
    pub template_settings: TemplateSettings,
    /// Opaque host/path settings handed to block handlers.
    pub config: Map<String, Value>,
}

/// Template delimiter settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSettings {
    /// Placeholder regex; its first capture group is the data key.
    ///
    /// Default: `<%=([\s\S]+?)%>`
    pub interpolate: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            interpolate: DEFAULT_INTERPOLATE.to_owned(),
        }
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            data: Map::new(),
            environment: None,
            comment_marker: DEFAULT_MARKER.to_owned(),
            strip: false,
            recursive: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            custom_block_types: Vec::new(),
            template_settings: TemplateSettings::default(),
            config: Map::new(),
        }
    }
}

impl ProcessOptions {
    /// Set the active environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the comment marker.
    #[must_use]
    pub fn with_comment_marker(mut self, marker: impl Into<String>) -> Self {
        self.comment_marker = marker.into();
        self
    }

    /// Enable or disable strip mode.
    #[must_use]
    pub fn with_strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    /// Enable or disable recursive includes.
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the maximum include depth.
    #[must_use]
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Add a template data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Add a declarative handler source.
    #[must_use]
    pub fn with_custom_block_type(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_block_types.push(path.into());
        self
    }

    /// Set the template placeholder pattern.
    #[must_use]
    pub fn with_interpolate(mut self, pattern: impl Into<String>) -> Self {
        self.template_settings.interpolate = pattern.into();
        self
    }

    /// Add a pass-through config entry.
    #[must_use]
    pub fn with_config_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Template data with the active environment exposed as `environment`,
    /// unless the data model already defines that key.
    #[must_use]
    pub fn template_data(&self) -> Value {
        let mut data = self.data.clone();
        if let Some(environment) = &self.environment {
            data.entry("environment")
                .or_insert_with(|| Value::String(environment.clone()));
        }
        Value::Object(data)
    }
}
