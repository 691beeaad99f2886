//! `include` handler.

use std::io;

use crate::context::BlockContext;
use crate::error::ProcessError;
use crate::grammar::Directive;
use crate::handler::BlockHandler;
use crate::output::BlockOutput;

use super::{INCLUDE, unquote};

/// Replaces its block with the content of the file named in the directive
/// arguments, resolved against the context's base directory.
///
/// The block content is ignored. Re-processing of the included text is up to the
/// processor.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncludeHandler;

impl BlockHandler for IncludeHandler {
    fn name(&self) -> &str {
        INCLUDE
    }

    fn reads_content(&self, _directive: &Directive) -> bool {
        false
    }

    fn handle(
        &self,
        _content: &str,
        directive: &Directive,
        ctx: &mut BlockContext,
    ) -> Result<BlockOutput, ProcessError> {
        let target = unquote(&directive.args);
        if target.is_empty() {
            return Err(ProcessError::MalformedDirective {
                location: ctx.location(),
                directive: directive.start_marker.clone(),
                reason: "include requires a file path".to_owned(),
            });
        }

        let path = ctx.resolve_path(target);
        match ctx.read(&path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), line = ctx.line, "Including file");
                Ok(BlockOutput::Include { path, content })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ProcessError::IncludeNotFound {
                location: ctx.location(),
                path,
            }),
            Err(source) => Err(ProcessError::IncludeRead {
                location: ctx.location(),
                path,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::handlers::test_support::{directive, read_fixture};

    #[test]
    fn test_include_reads_relative_to_base_dir() {
        let mut ctx = BlockContext::new(Path::new("site"), &read_fixture);
        let output = IncludeHandler
            .handle(
                "ignored",
                &directive("<!-- build:include partials/nav.html -->"),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(
            output,
            BlockOutput::Include {
                path: PathBuf::from("site/partials/nav.html"),
                content: "<nav></nav>\n".to_owned(),
            }
        );
    }

    #[test]
    fn test_include_quoted_path() {
        let mut ctx = BlockContext::new(Path::new("site"), &read_fixture);
        let output = IncludeHandler
            .handle(
                "",
                &directive("<!-- build:include \"partials/nav.html\" -->"),
                &mut ctx,
            )
            .unwrap();
        assert!(matches!(output, BlockOutput::Include { .. }));
    }

    #[test]
    fn test_include_missing_file() {
        let mut ctx = BlockContext::new(Path::new("site"), &read_fixture)
            .with_source_path(Some(Path::new("site/index.html")))
            .with_line(8);
        let err = IncludeHandler
            .handle("", &directive("<!-- build:include missing.html -->"), &mut ctx)
            .unwrap_err();
        match err {
            ProcessError::IncludeNotFound { location, path } => {
                assert_eq!(location.line, 8);
                assert_eq!(path, PathBuf::from("site/missing.html"));
            }
            other => panic!("expected include not found, got {other:?}"),
        }
    }

    #[test]
    fn test_include_unreadable_file() {
        fn locked(_: &Path) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
        let mut ctx = BlockContext::new(Path::new("site"), &locked).with_line(3);
        let err = IncludeHandler
            .handle("", &directive("<!-- build:include nav.html -->"), &mut ctx)
            .unwrap_err();
        match err {
            ProcessError::IncludeRead {
                location,
                path,
                source,
            } => {
                assert_eq!(location.line, 3);
                assert_eq!(path, PathBuf::from("site/nav.html"));
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected include read error, got {other:?}"),
        }
    }

    #[test]
    fn test_include_without_path() {
        let mut ctx = BlockContext::new(Path::new("site"), &read_fixture);
        let err = IncludeHandler
            .handle("", &directive("<!-- build:include -->"), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ProcessError::MalformedDirective { .. }));
    }
}
