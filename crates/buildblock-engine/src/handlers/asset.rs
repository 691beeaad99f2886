//! `js` and `css` handlers.
//!
//! Three forms are supported:
//!
//! - `<!-- build:js app.min.js -->` replaces the block with one reference to
//!   `app.min.js`.
//! - `<!-- build:js inline app.min.js -->` replaces the block with the content of
//!   `app.min.js` in a `<script>` element.
//! - `<!-- build:js inline -->` inlines every `<script src>` reference inside the
//!   block, one by one.
//!
//! Inlined asset text is emitted as is, even when it contains comments that
//! look like directives.
//!
//! Inlining failures are never fatal: the reference is left as it was and a
//! warning is recorded.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::context::BlockContext;
use crate::error::ProcessError;
use crate::grammar::Directive;
use crate::handler::BlockHandler;
use crate::output::BlockOutput;
use crate::transform::AssetKind;

use super::unquote;

static SCRIPT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>\s*</script>"#)
        .unwrap()
});

static STYLESHEET_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<link\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>"#).unwrap()
});

const INLINE_KEYWORD: &str = "inline";

/// Handler for `js` or `css` blocks.
#[derive(Clone, Copy, Debug)]
pub struct AssetHandler {
    kind: AssetKind,
}

impl AssetHandler {
    /// Create a handler for one asset kind.
    #[must_use]
    pub fn new(kind: AssetKind) -> Self {
        Self { kind }
    }

    /// Asset kind handled.
    #[must_use]
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    fn reference_tag(&self, target: &str) -> String {
        match self.kind {
            AssetKind::Js => format!(r#"<script src="{target}"></script>"#),
            AssetKind::Css => format!(r#"<link rel="stylesheet" href="{target}">"#),
        }
    }

    fn inline_tag(&self, body: &str) -> String {
        match self.kind {
            AssetKind::Js => format!("<script>\n{body}\n</script>"),
            AssetKind::Css => format!("<style>\n{body}\n</style>"),
        }
    }

    fn reference_pattern(&self) -> &'static Regex {
        match self.kind {
            AssetKind::Js => &SCRIPT_REF,
            AssetKind::Css => &STYLESHEET_REF,
        }
    }

    /// Read and transform one asset, or record why it cannot be inlined.
    fn load(&self, reference: &str, ctx: &mut BlockContext) -> Option<String> {
        let Some(path) = resolve_asset(reference, ctx) else {
            ctx.warn(format!("cannot inline remote {} `{reference}`", self.kind));
            return None;
        };
        let content = match ctx.read(&path) {
            Ok(content) => content,
            Err(e) => {
                ctx.warn(format!(
                    "cannot inline {} `{}`: {e}",
                    self.kind,
                    path.display()
                ));
                return None;
            }
        };
        match ctx.transform.transform(&content, self.kind) {
            Ok(body) => Some(body),
            Err(e) => {
                ctx.warn(format!("{}: {e}", path.display()));
                None
            }
        }
    }

    fn inline_references(&self, content: &str, ctx: &mut BlockContext) -> String {
        let mut inlined = 0usize;
        let rewritten = self
            .reference_pattern()
            .replace_all(content, |caps: &Captures| {
                let reference = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map_or("", |m| m.as_str());
                match self.load(reference, ctx) {
                    Some(body) => {
                        inlined += 1;
                        self.inline_tag(&body)
                    }
                    None => caps[0].to_owned(),
                }
            })
            .into_owned();
        tracing::debug!(kind = %self.kind, inlined, "Inlined asset references");
        rewritten
    }
}

impl BlockHandler for AssetHandler {
    fn name(&self) -> &str {
        self.kind.block_type()
    }

    /// Only the bare `inline` form looks for references in the content.
    fn reads_content(&self, directive: &Directive) -> bool {
        strip_keyword(&directive.args, INLINE_KEYWORD)
            .is_some_and(|rest| unquote(rest).is_empty())
    }

    fn handle(
        &self,
        content: &str,
        directive: &Directive,
        ctx: &mut BlockContext,
    ) -> Result<BlockOutput, ProcessError> {
        let args = directive.args.as_str();

        let Some(rest) = strip_keyword(args, INLINE_KEYWORD) else {
            let target = unquote(args);
            if target.is_empty() {
                ctx.warn(format!("`{}` block without a target path", self.kind));
                return Ok(BlockOutput::Keep);
            }
            return Ok(BlockOutput::Replace(self.reference_tag(target)));
        };

        let target = unquote(rest);
        if target.is_empty() {
            return Ok(BlockOutput::Rewrite(self.inline_references(content, ctx)));
        }

        Ok(match self.load(target, ctx) {
            Some(body) => BlockOutput::Replace(self.inline_tag(&body)),
            None => BlockOutput::Keep,
        })
    }
}

/// Match `keyword` as the first word of `args`, returning the remainder.
fn strip_keyword<'a>(args: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = args.strip_prefix(keyword)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}

/// Resolve an asset reference to a local path.
///
/// Remote references yield `None`. Query strings and fragments are dropped, and
/// root-relative references resolve against the base directory.
fn resolve_asset(reference: &str, ctx: &BlockContext) -> Option<PathBuf> {
    if reference.contains("://") || reference.starts_with("//") {
        return None;
    }
    let local = reference
        .find(['?', '#'])
        .map_or(reference, |i| &reference[..i]);
    Some(ctx.resolve_path(local.trim_start_matches('/')))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::handlers::test_support::{directive, read_fixture};
    use crate::transform::TransformError;

    fn run(kind: AssetKind, comment: &str, content: &str) -> (BlockOutput, Vec<String>) {
        let mut ctx = BlockContext::new(Path::new("site"), &read_fixture);
        let output = AssetHandler::new(kind)
            .handle(content, &directive(comment), &mut ctx)
            .unwrap();
        (output, ctx.warnings().to_vec())
    }

    #[test]
    fn test_js_reference() {
        let (output, _) = run(
            AssetKind::Js,
            "<!-- build:js js/app.min.js -->",
            "<script src=\"js/a.js\"></script>",
        );
        assert_eq!(
            output,
            BlockOutput::replace(r#"<script src="js/app.min.js"></script>"#)
        );
    }

    #[test]
    fn test_css_reference() {
        let (output, _) = run(AssetKind::Css, "<!-- build:css(dist) css/all.css -->", "");
        assert_eq!(
            output,
            BlockOutput::replace(r#"<link rel="stylesheet" href="css/all.css">"#)
        );
    }

    #[test]
    fn test_missing_target_keeps_block() {
        let (output, warnings) = run(AssetKind::Js, "<!-- build:js -->", "x");
        assert_eq!(output, BlockOutput::Keep);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_inline_file() {
        let (output, warnings) = run(AssetKind::Js, "<!-- build:js inline js/app.js -->", "");
        assert_eq!(output, BlockOutput::replace("<script>\nvar app = 1;\n</script>"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_inline_css_file() {
        let (output, _) = run(AssetKind::Css, "<!-- build:css inline css/main.css -->", "");
        assert_eq!(
            output,
            BlockOutput::replace("<style>\nbody { margin: 0; }\n</style>")
        );
    }

    #[test]
    fn test_inline_missing_file_keeps_block() {
        let (output, warnings) = run(AssetKind::Js, "<!-- build:js inline js/gone.js -->", "");
        assert_eq!(output, BlockOutput::Keep);
        assert!(warnings[0].contains("js/gone.js"));
    }

    #[test]
    fn test_inline_references() {
        let content = "<script src=\"js/app.js\"></script>\n<script src='/js/vendor.js?v=2'></script>";
        let (output, warnings) = run(AssetKind::Js, "<!-- build:js inline -->", content);
        assert_eq!(
            output,
            BlockOutput::rewrite(
                "<script>\nvar app = 1;\n</script>\n<script>\nvar vendor = 2;\n</script>"
            )
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_inline_references_skip_remote_and_missing() {
        let content = "<script src=\"https://cdn.example.com/x.js\"></script>\n<script src=\"js/app.js\"></script>\n<script src=\"js/none.js\"></script>";
        let (output, warnings) = run(AssetKind::Js, "<!-- build:js inline -->", content);
        assert_eq!(
            output,
            BlockOutput::rewrite(
                "<script src=\"https://cdn.example.com/x.js\"></script>\n<script>\nvar app = 1;\n</script>\n<script src=\"js/none.js\"></script>"
            )
        );
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_inline_stylesheet_references() {
        let content = r#"<link rel="stylesheet" href="css/main.css">"#;
        let (output, _) = run(AssetKind::Css, "<!-- build:css inline -->", content);
        assert_eq!(
            output,
            BlockOutput::rewrite("<style>\nbody { margin: 0; }\n</style>")
        );
    }

    #[test]
    fn test_transform_failure_keeps_reference() {
        fn failing(_: &str, kind: AssetKind) -> Result<String, TransformError> {
            Err(TransformError::new(kind, "syntax error"))
        }
        let mut ctx =
            BlockContext::new(Path::new("site"), &read_fixture).with_transform(&failing);
        let output = AssetHandler::new(AssetKind::Js)
            .handle("", &directive("<!-- build:js inline js/app.js -->"), &mut ctx)
            .unwrap();
        assert_eq!(output, BlockOutput::Keep);
        assert!(ctx.warnings()[0].contains("js transform failed: syntax error"));
    }

    #[test]
    fn test_inline_keyword_must_be_a_word() {
        let (output, _) = run(AssetKind::Js, "<!-- build:js inline.js -->", "");
        assert_eq!(output, BlockOutput::replace(r#"<script src="inline.js"></script>"#));
    }

    #[test]
    fn test_only_bare_inline_reads_content() {
        let handler = AssetHandler::new(AssetKind::Js);
        assert!(handler.reads_content(&directive("<!-- build:js inline -->")));
        assert!(!handler.reads_content(&directive("<!-- build:js inline app.js -->")));
        assert!(!handler.reads_content(&directive("<!-- build:js app.min.js -->")));
    }

    #[test]
    fn test_inlined_text_kept_verbatim() {
        fn read(_: &Path) -> std::io::Result<String> {
            Ok("var s = '<!-- endbuild -->';\n".to_owned())
        }
        let mut ctx = BlockContext::new(Path::new("site"), &read);
        let output = AssetHandler::new(AssetKind::Js)
            .handle(
                "<script src=\"js/app.js\"></script>",
                &directive("<!-- build:js inline -->"),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            output,
            BlockOutput::rewrite("<script>\nvar s = '<!-- endbuild -->';\n</script>")
        );
    }
}
