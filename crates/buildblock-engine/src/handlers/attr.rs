//! `[attr]` handler.

use regex::{Captures, Regex};

use crate::context::BlockContext;
use crate::error::ProcessError;
use crate::grammar::Directive;
use crate::handler::BlockHandler;
use crate::output::BlockOutput;

use super::{ATTR, unquote};

/// Rewrites an attribute in every tag of its block.
///
/// `<!-- build:[src] js/app.min.js -->` sets each `src` attribute to
/// `js/app.min.js`. A value ending in `/` only replaces the directory, so
/// `<!-- build:[src] img/ -->` turns `src="assets/logo.png"` into
/// `src="img/logo.png"`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttrHandler;

impl BlockHandler for AttrHandler {
    fn name(&self) -> &str {
        ATTR
    }

    fn handle(
        &self,
        content: &str,
        directive: &Directive,
        ctx: &mut BlockContext,
    ) -> Result<BlockOutput, ProcessError> {
        let Some(attribute) = directive.attribute() else {
            return Err(ProcessError::MalformedDirective {
                location: ctx.location(),
                directive: directive.start_marker.clone(),
                reason: "attribute block type must look like `[name]`".to_owned(),
            });
        };

        let value = unquote(&directive.args);
        if value.is_empty() {
            ctx.warn(format!("`[{attribute}]` block without a value"));
            return Ok(BlockOutput::Keep);
        }

        let pattern = Regex::new(&format!(
            r#"(\s{}\s*=\s*)(?:"([^"]*)"|'([^']*)')"#,
            regex::escape(attribute)
        ))
        .map_err(|e| ProcessError::MalformedDirective {
            location: ctx.location(),
            directive: directive.start_marker.clone(),
            reason: e.to_string(),
        })?;

        let mut count = 0usize;
        let rewritten = pattern
            .replace_all(content, |caps: &Captures| {
                count += 1;
                let (original, quote) = match caps.get(2) {
                    Some(m) => (m.as_str(), '"'),
                    None => (caps.get(3).map_or("", |m| m.as_str()), '\''),
                };
                format!("{}{quote}{}{quote}", &caps[1], new_value(value, original))
            })
            .into_owned();

        if count == 0 {
            ctx.warn(format!("no `{attribute}` attribute found in block"));
        }
        Ok(BlockOutput::Rewrite(rewritten))
    }
}

/// Value replacing `original`. A directory value keeps the original file name.
fn new_value(value: &str, original: &str) -> String {
    if value.ends_with('/') {
        let file_name = original.rsplit('/').next().unwrap_or(original);
        format!("{value}{file_name}")
    } else {
        value.to_owned()
    }
}
