//! Block handler output.

use std::path::PathBuf;

/// What a [`BlockHandler`](crate::BlockHandler) does with its block.
///
/// Directive comments are never part of the output, whatever the variant.
///
/// # Example
///
/// ```
/// use buildblock_engine::BlockOutput;
///
/// let output = BlockOutput::replace("<script src=\"app.min.js\"></script>");
/// assert!(matches!(output, BlockOutput::Replace(_)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockOutput {
    /// Keep the block content. Nested blocks inside it are processed.
    Keep,
    /// Drop the block and its content.
    Drop,
    /// Rewritten block content, emitted as is with its own layout.
    Rewrite(String),
    /// New markup replacing the block. Indented to the open directive when the
    /// block sits on lines of its own.
    Replace(String),
    /// Content of an included file, re-processed when recursion is enabled.
    Include {
        /// Resolved path of the included file.
        path: PathBuf,
        /// File content as read.
        content: String,
    },
}

impl BlockOutput {
    /// Create a [`Rewrite`](Self::Rewrite) output.
    #[must_use]
    pub fn rewrite(s: impl Into<String>) -> Self {
        Self::Rewrite(s.into())
    }

    /// Create a [`Replace`](Self::Replace) output.
    #[must_use]
    pub fn replace(s: impl Into<String>) -> Self {
        Self::Replace(s.into())
    }
}
