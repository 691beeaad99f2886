//! Configuration management for buildblock.
//!
//! Parses `buildblock.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! ```toml
//! [options]
//! environment = "dist"
//! recursive = true
//!
//! [options.data]
//! title = "Home"
//!
//! [[files]]
//! src = ["src/index.html"]
//! dest = "dist/index.html"
//! ```
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `options.environment`
//! - `options.custom_block_types` (also `~`)
//! - `files[].src` and `files[].dest` (also `~`)

mod expand;

use std::path::{Path, PathBuf};

use buildblock_engine::{DelimiterTemplate, Invocation, ProcessOptions, is_valid_marker};
use serde::Deserialize;
use serde_json::Value;

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "buildblock.toml";

/// CLI settings that override configuration file values.
///
/// Scalar fields override only when set. List fields are appended.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override active environment.
    pub environment: Option<String>,
    /// Override strip mode.
    pub strip: Option<bool>,
    /// Override recursive includes.
    pub recursive: Option<bool>,
    /// Override comment marker.
    pub comment_marker: Option<String>,
    /// Extra template data entries, overriding same-named keys.
    pub data: Vec<(String, String)>,
    /// Extra declarative handler sources, registered after the configured ones.
    pub custom_block_types: Vec<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Processing options.
    pub options: ProcessOptions,
    /// File jobs as parsed from TOML (paths as strings).
    files: Vec<FileJobRaw>,

    /// Resolved file jobs (set after loading).
    #[serde(skip)]
    pub jobs: Vec<Invocation>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Raw `[[files]]` entry.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileJobRaw {
    src: Vec<String>,
    dest: String,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`files[0].dest`").
        field: String,
        /// Error message (e.g., "${`OUT_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `buildblock.toml` in current directory and parents,
    /// falling back to defaults with no file jobs.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| discover_config(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolved file jobs.
    #[must_use]
    pub fn jobs(&self) -> &[Invocation] {
        &self.jobs
    }

    /// Directory relative paths were resolved against.
    #[must_use]
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        let options = &mut self.options;
        if let Some(environment) = &settings.environment {
            options.environment = Some(environment.clone());
        }
        if let Some(strip) = settings.strip {
            options.strip = strip;
        }
        if let Some(recursive) = settings.recursive {
            options.recursive = recursive;
        }
        if let Some(marker) = &settings.comment_marker {
            options.comment_marker.clone_from(marker);
        }
        for (key, value) in &settings.data {
            options
                .data
                .insert(key.clone(), Value::String(value.clone()));
        }
        options
            .custom_block_types
            .extend(settings.custom_block_types.iter().cloned());
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically by [`Config::load`] after CLI settings are applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_options()?;
        self.validate_files()?;
        Ok(())
    }

    /// Validate processing options.
    fn validate_options(&self) -> Result<(), ConfigError> {
        let options = &self.options;
        require_non_empty(&options.comment_marker, "options.comment_marker")?;
        if !is_valid_marker(&options.comment_marker) {
            return Err(ConfigError::Validation(format!(
                "options.comment_marker `{}` may only contain ASCII letters, digits, `-` and `_`",
                options.comment_marker
            )));
        }

        if options.max_include_depth == 0 {
            return Err(ConfigError::Validation(
                "options.max_include_depth must be greater than 0".to_owned(),
            ));
        }

        if let Err(e) = DelimiterTemplate::new(&options.template_settings.interpolate) {
            return Err(ConfigError::Validation(format!(
                "options.template_settings.interpolate: {e}"
            )));
        }

        Ok(())
    }

    /// Validate file jobs.
    fn validate_files(&self) -> Result<(), ConfigError> {
        for (i, job) in self.files.iter().enumerate() {
            if job.src.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "files[{i}].src must list at least one file"
                )));
            }
            if let Some(j) = job.src.iter().position(String::is_empty) {
                return Err(ConfigError::Validation(format!(
                    "files[{i}].src[{j}] cannot be empty"
                )));
            }
            require_non_empty(&job.dest, &format!("files[{i}].dest"))?;
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref environment) = self.options.environment {
            self.options.environment =
                Some(expand::expand_env(environment, "options.environment")?);
        }

        for (i, path) in self.options.custom_block_types.iter_mut().enumerate() {
            let field = format!("options.custom_block_types[{i}]");
            *path = PathBuf::from(expand::expand_path(&path.to_string_lossy(), &field)?);
        }

        for (i, job) in self.files.iter_mut().enumerate() {
            for (j, src) in job.src.iter_mut().enumerate() {
                *src = expand::expand_path(src, &format!("files[{i}].src[{j}]"))?;
            }
            job.dest = expand::expand_path(&job.dest, &format!("files[{i}].dest"))?;
        }

        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        for path in &mut self.options.custom_block_types {
            *path = config_dir.join(&*path);
        }

        self.jobs = self
            .files
            .iter()
            .map(|job| {
                Invocation::new(
                    job.src.iter().map(|s| config_dir.join(s)).collect(),
                    config_dir.join(&job.dest),
                )
            })
            .collect();
    }
}

/// Search for a config file in `start` and its parents.
fn discover_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}
