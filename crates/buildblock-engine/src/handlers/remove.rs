//! `remove` handler.

use crate::context::BlockContext;
use crate::error::ProcessError;
use crate::grammar::Directive;
use crate::handler::BlockHandler;
use crate::output::BlockOutput;

use super::REMOVE;

/// Drops its block.
///
/// Only dispatched when the directive matches the active environment (or strip
/// mode is on). A non-matching `remove` block is kept by the processor without
/// reaching this handler.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoveHandler;

impl BlockHandler for RemoveHandler {
    fn name(&self) -> &str {
        REMOVE
    }

    fn reads_content(&self, _directive: &Directive) -> bool {
        false
    }

    fn handle(
        &self,
        _content: &str,
        _directive: &Directive,
        _ctx: &mut BlockContext,
    ) -> Result<BlockOutput, ProcessError> {
        Ok(BlockOutput::Drop)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::handlers::test_support::{directive, read_fixture};

    #[test]
    fn test_remove_drops() {
        let mut ctx = BlockContext::new(Path::new("site"), &read_fixture);
        let output = RemoveHandler
            .handle("<p>x</p>", &directive("<!-- build:remove -->"), &mut ctx)
            .unwrap();
        assert_eq!(output, BlockOutput::Drop);
        assert!(ctx.warnings().is_empty());
    }
}
