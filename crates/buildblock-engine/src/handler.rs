//! Block handler trait.

use crate::context::BlockContext;
use crate::error::ProcessError;
use crate::grammar::Directive;
use crate::output::BlockOutput;

/// Handler for one block type.
///
/// A handler is called once per matching block with the block content (without
/// directive comments), the directive that selected it, and a context for file
/// access and warnings.
///
/// Nested blocks in the content are processed before the handler sees it, unless
/// [`reads_content`](Self::reads_content) says the content is unused. Text the
/// handler returns is final and never scanned for directives.
///
/// # Thread Safety
///
/// Handlers are `Send + Sync` and take `&self`: a single registry is shared by
/// every file of a batch, possibly across threads. Per-block state belongs in the
/// [`BlockContext`].
///
/// # Example
///
/// ```
/// use buildblock_engine::{BlockContext, BlockHandler, BlockOutput, Directive, ProcessError};
///
/// struct Uppercase;
///
/// impl BlockHandler for Uppercase {
///     fn name(&self) -> &str { "upper" }
///
///     fn handle(
///         &self,
///         content: &str,
///         _directive: &Directive,
///         _ctx: &mut BlockContext,
///     ) -> Result<BlockOutput, ProcessError> {
///         Ok(BlockOutput::rewrite(content.to_uppercase()))
///     }
/// }
/// ```
pub trait BlockHandler: Send + Sync {
    /// Block type handled (e.g., `remove`, `include`).
    ///
    /// Matched against the directive syntax: `<!-- build:name -->`.
    fn name(&self) -> &str;

    /// Whether [`handle`](Self::handle) looks at the block content for this
    /// directive.
    ///
    /// When `false` the handler gets the raw content, and nested blocks are only
    /// processed if it returns [`BlockOutput::Keep`].
    fn reads_content(&self, _directive: &Directive) -> bool {
        true
    }

    /// Handle one block.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessError`] to abort processing of the current file.
    /// Recoverable problems should be reported with [`BlockContext::warn`]
    /// instead.
    fn handle(
        &self,
        content: &str,
        directive: &Directive,
        ctx: &mut BlockContext,
    ) -> Result<BlockOutput, ProcessError>;
}
