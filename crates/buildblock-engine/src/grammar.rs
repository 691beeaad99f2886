//! Directive comment grammar.
//!
//! Open directives look like `<!-- build:type(target1,target2) args -->`, close
//! directives like `<!-- endbuild -->` or `<!-- /build -->`. The `build` keyword is
//! the configurable comment marker.
//!
//! ```text
//! open    = "<!--" ws marker ":" type [targets] [ws args] ws "-->"
//! type    = name | "[" attribute "]"
//! targets = "(" [label *("," label)] ")" | ":" label *("," label)
//! close   = "<!--" ws ("end" | "/") marker ws "-->"
//! ```

use regex::Regex;

/// Default comment marker keyword.
pub const DEFAULT_MARKER: &str = "build";

/// A parsed open directive.
///
/// Produced once per directive occurrence by the block scanner and never mutated
/// after the matching close directive has been found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    /// Block type (e.g., `remove`, `include`, `js`, `[src]`).
    pub block_type: String,
    /// Declared target environments. Empty means the directive is unconditional.
    pub targets: Vec<String>,
    /// Everything after the type and target list, trimmed.
    pub args: String,
    /// Raw open directive comment.
    pub start_marker: String,
    /// Raw close directive comment.
    pub end_marker: String,
}

impl Directive {
    /// Attribute name for `[attr]` blocks, `None` for ordinary block types.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        self.block_type
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
    }
}

/// A directive comment recognized by [`DirectiveGrammar::classify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Open directive.
    Open(Directive),
    /// Close directive.
    Close,
}

/// Grammar for one comment marker.
#[derive(Clone, Debug)]
pub struct DirectiveGrammar {
    marker: String,
    locator: Regex,
}

impl DirectiveGrammar {
    /// Build the grammar for `marker`.
    ///
    /// Returns `None` if the marker is empty or contains characters other than
    /// ASCII letters, digits, `-` and `_`.
    #[must_use]
    pub fn new(marker: &str) -> Option<Self> {
        if !is_valid_marker(marker) {
            return None;
        }
        let m = regex::escape(marker);
        // Anchoring on `<!--` + keyword keeps conditional comments such as
        // `<!--[if IE]>` from being taken as directive delimiters.
        let locator =
            Regex::new(&format!(r"<!--[ \t]*(?:(?:end|/){m}[ \t]*-->|{m}:[^\r\n]*?-->)")).ok()?;
        Some(Self {
            marker: marker.to_owned(),
            locator,
        })
    }

    /// The comment marker keyword.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Find the next directive comment at or after byte offset `from`.
    ///
    /// Returns the byte range of the whole comment.
    pub(crate) fn find(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        self.locator.find_at(text, from).map(|m| (m.start(), m.end()))
    }

    /// Classify a raw directive comment.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the comment carries the marker but
    /// its body does not follow the grammar.
    pub fn classify(&self, comment: &str) -> Result<Token, String> {
        let inner = comment
            .strip_prefix("<!--")
            .and_then(|rest| rest.strip_suffix("-->"))
            .ok_or_else(|| "not an HTML comment".to_owned())?
            .trim();

        if let Some(keyword) = inner.strip_prefix("end").or_else(|| inner.strip_prefix('/'))
            && keyword == self.marker
        {
            return Ok(Token::Close);
        }

        let body = inner
            .strip_prefix(self.marker.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| format!("expected `{}:<type>`", self.marker))?;

        let (block_type, targets, args) = parse_body(body)?;
        Ok(Token::Open(Directive {
            block_type,
            targets,
            args,
            start_marker: comment.to_owned(),
            end_marker: String::new(),
        }))
    }

    /// Parse a raw open directive comment.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the comment is not a well-formed
    /// open directive for this marker.
    pub fn parse_open(&self, comment: &str) -> Result<Directive, String> {
        match self.classify(comment)? {
            Token::Open(directive) => Ok(directive),
            Token::Close => Err("expected an open directive, found an end marker".to_owned()),
        }
    }
}

/// Check that a comment marker is a plain keyword.
#[must_use]
pub fn is_valid_marker(marker: &str) -> bool {
    !marker.is_empty() && marker.chars().all(is_name_char)
}

/// Check that a name is usable as a block type.
///
/// Accepts plain names (`include`, `my-type`) and attribute types (`[src]`).
#[must_use]
pub fn is_valid_block_type(name: &str) -> bool {
    match name.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        Some(attr) => !attr.is_empty() && attr.chars().all(is_attribute_char),
        None => !name.is_empty() && name.chars().all(is_name_char),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_attribute_char(c: char) -> bool {
    is_name_char(c) || c == ':' || c == '.'
}

fn is_label_char(c: char) -> bool {
    is_name_char(c) || c == '.'
}

/// Split a directive body into type, targets and arguments.
fn parse_body(body: &str) -> Result<(String, Vec<String>, String), String> {
    let type_end = if body.starts_with('[') {
        body.find(']')
            .map(|i| i + 1)
            .ok_or_else(|| "unclosed `[` in attribute block type".to_owned())?
    } else {
        body.find(|c: char| !is_name_char(c)).unwrap_or(body.len())
    };

    let block_type = &body[..type_end];
    if block_type.is_empty() {
        return Err("missing block type".to_owned());
    }
    if !is_valid_block_type(block_type) {
        return Err(format!("invalid block type `{block_type}`"));
    }

    let rest = &body[type_end..];
    let (targets, rest) = if let Some(list) = rest.strip_prefix('(') {
        let close = list
            .find(')')
            .ok_or_else(|| "unclosed `(` in target list".to_owned())?;
        (parse_targets(&list[..close], true)?, &list[close + 1..])
    } else if let Some(list) = rest.strip_prefix(':') {
        let end = list.find(char::is_whitespace).unwrap_or(list.len());
        (parse_targets(&list[..end], false)?, &list[end..])
    } else {
        (Vec::new(), rest)
    };

    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err(format!("unexpected `{}` after block type", rest.trim_end()));
    }

    Ok((block_type.to_owned(), targets, rest.trim().to_owned()))
}

fn parse_targets(list: &str, allow_empty: bool) -> Result<Vec<String>, String> {
    if list.trim().is_empty() {
        return if allow_empty {
            Ok(Vec::new())
        } else {
            Err("empty target list".to_owned())
        };
    }

    list.split(',')
        .map(str::trim)
        .map(|label| {
            if label.is_empty() {
                Err("empty target in target list".to_owned())
            } else if label.chars().all(is_label_char) {
                Ok(label.to_owned())
            } else {
                Err(format!("invalid target `{label}`"))
            }
        })
        .collect()
}
