//! Environment variable expansion for configuration strings.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - a leading `~` in paths - expands to the home directory

use crate::ConfigError;

/// Expand environment variable references in a string.
///
/// Returns the original string unchanged if no `${}` patterns are present.
/// Bare `$VAR` syntax is not expanded (only `${VAR}` with braces).
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Expand environment variables, then a leading `~`, in a path string.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<String, ConfigError> {
    let expanded = expand_env(value, field)?;
    Ok(shellexpand::tilde(&expanded).into_owned())
}

/// Error returned when environment variable lookup fails.
struct LookupError {
    var_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_simple_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("BB_TEST_VAR_SIMPLE", "dist");
        }
        let result = expand_env("${BB_TEST_VAR_SIMPLE}", "options.environment").unwrap();
        assert_eq!(result, "dist");
        unsafe {
            std::env::remove_var("BB_TEST_VAR_SIMPLE");
        }
    }

    #[test]
    fn test_expand_with_default_uses_default() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("BB_UNSET_VAR_TEST");
        }
        let result = expand_env("${BB_UNSET_VAR_TEST:-dev}", "options.environment").unwrap();
        assert_eq!(result, "dev");
    }

    #[test]
    fn test_expand_missing_var_error() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("BB_MISSING_VAR_TEST");
        }
        let err = expand_env("${BB_MISSING_VAR_TEST}", "files[0].dest").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("BB_MISSING_VAR_TEST"));
        assert!(err.to_string().contains("files[0].dest"));
    }

    #[test]
    fn test_expand_literal_unchanged() {
        let result = expand_env("dist/$name.html", "files[0].dest").unwrap();
        assert_eq!(result, "dist/$name.html");
    }

    #[test]
    fn test_expand_embedded_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("BB_OUT_TEST", "public");
        }
        let result = expand_path("${BB_OUT_TEST}/index.html", "files[0].dest").unwrap();
        assert_eq!(result, "public/index.html");
        unsafe {
            std::env::remove_var("BB_OUT_TEST");
        }
    }

    #[test]
    fn test_expand_path_tilde() {
        let result = expand_path("~/site/index.html", "files[0].src").unwrap();
        assert!(!result.starts_with('~'));
        assert!(result.ends_with("/site/index.html"));
    }

    #[test]
    fn test_expand_path_tilde_only_at_start() {
        let result = expand_path("site/~draft.html", "files[0].src").unwrap();
        assert_eq!(result, "site/~draft.html");
    }
}
