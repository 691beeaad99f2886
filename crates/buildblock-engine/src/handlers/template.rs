//! `template` handler.

use crate::context::BlockContext;
use crate::error::ProcessError;
use crate::grammar::Directive;
use crate::handler::BlockHandler;
use crate::output::BlockOutput;

use super::TEMPLATE;

/// Renders its block content with the template engine and data model.
///
/// Substituted values are literal text: they are neither scanned for directives
/// nor treated as replacement patterns.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateHandler;

impl BlockHandler for TemplateHandler {
    fn name(&self) -> &str {
        TEMPLATE
    }

    fn handle(
        &self,
        content: &str,
        _directive: &Directive,
        ctx: &mut BlockContext,
    ) -> Result<BlockOutput, ProcessError> {
        Ok(BlockOutput::Rewrite(ctx.render_template(content)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::handlers::test_support::{directive, read_fixture};
    use crate::template::DelimiterTemplate;

    #[test]
    fn test_template_renders_content() {
        let data = json!({ "msg": "hey", "test": "text_$&_text" });
        let template = DelimiterTemplate::default();
        let mut ctx =
            BlockContext::new(Path::new("site"), &read_fixture).with_template(&template, &data);
        let output = TemplateHandler
            .handle(
                "<p><%= msg %></p>\n<p><%= test %></p>",
                &directive("<!-- build:template -->"),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            output,
            BlockOutput::rewrite("<p>hey</p>\n<p>text_$&_text</p>")
        );
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_template_unknown_key_warns() {
        let data = json!({});
        let template = DelimiterTemplate::default();
        let mut ctx = BlockContext::new(Path::new("site"), &read_fixture)
            .with_line(5)
            .with_template(&template, &data);
        let output = TemplateHandler
            .handle("<%= missing %>", &directive("<!-- build:template -->"), &mut ctx)
            .unwrap();
        assert_eq!(output, BlockOutput::rewrite("<%= missing %>"));
        assert_eq!(ctx.warnings(), ["<input>:5: unknown template key `missing`"]);
    }
}
