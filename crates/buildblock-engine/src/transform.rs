//! Asset transform collaborator used by the inline handlers.

use std::fmt;

/// Kind of asset being inlined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// JavaScript, inlined into `<script>`.
    Js,
    /// Stylesheet, inlined into `<style>`.
    Css,
}

impl AssetKind {
    /// Block type name handled for this kind.
    #[must_use]
    pub fn block_type(self) -> &'static str {
        match self {
            Self::Js => "js",
            Self::Css => "css",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.block_type())
    }
}

/// Error returned by an [`AssetTransform`].
///
/// Never fatal: the inline handler reports it and leaves the original reference.
#[derive(Debug, thiserror::Error)]
#[error("{kind} transform failed: {message}")]
pub struct TransformError {
    /// Asset kind being transformed.
    pub kind: AssetKind,
    /// Failure description.
    pub message: String,
}

impl TransformError {
    /// Create a transform error.
    #[must_use]
    pub fn new(kind: AssetKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Minify/transform step applied to asset content before it is inlined.
///
/// Implementations must be shareable across threads: one processor serves all
/// files of a batch.
pub trait AssetTransform: Send + Sync {
    /// Transform `content` of the given kind.
    fn transform(&self, content: &str, kind: AssetKind) -> Result<String, TransformError>;
}

/// Default transform: content is inlined as-is, minus trailing whitespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughTransform;

impl AssetTransform for PassthroughTransform {
    fn transform(&self, content: &str, _kind: AssetKind) -> Result<String, TransformError> {
        Ok(content.trim_end().to_owned())
    }
}

impl<F> AssetTransform for F
where
    F: Fn(&str, AssetKind) -> Result<String, TransformError> + Send + Sync,
{
    fn transform(&self, content: &str, kind: AssetKind) -> Result<String, TransformError> {
        self(content, kind)
    }
}
