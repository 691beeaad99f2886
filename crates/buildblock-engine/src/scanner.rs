//! Block scanner.
//!
//! Walks a text buffer and yields literal gaps and build blocks in source order.
//! A block runs from its open directive (or a stack of same-type open directives
//! separated only by whitespace) to the matching close directive. Nested blocks are counted
//! so that the outermost block is yielded first with its nested blocks still inside
//! its content.

use std::path::Path;

use crate::error::{Location, ProcessError};
use crate::grammar::{Directive, DirectiveGrammar, Token};

/// Byte offsets of a block in the scanned buffer.
///
/// `open_start..open_end` covers the open directive(s), `inner_start..inner_end`
/// the content, and `close_start..close_end` the close directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSpan {
    pub open_start: usize,
    pub open_end: usize,
    pub inner_start: usize,
    pub inner_end: usize,
    pub close_start: usize,
    pub close_end: usize,
}

/// A build block found by the scanner.
#[derive(Clone, Debug)]
pub struct Block<'a> {
    /// Stacked open directives guarding this block, in source order.
    pub directives: Vec<Directive>,
    /// Offsets into the scanned buffer.
    pub span: BlockSpan,
    /// Line of the first open directive (1-indexed).
    pub line: usize,
    text: &'a str,
}

impl<'a> Block<'a> {
    /// Raw text between the last open directive and the close directive.
    #[must_use]
    pub fn inner(&self) -> &'a str {
        &self.text[self.span.inner_start..self.span.inner_end]
    }

    /// Indentation before the open directive, if the directives sit on lines of
    /// their own.
    ///
    /// A block is standalone when only horizontal whitespace precedes the open
    /// directive on its line and only horizontal whitespace follows the close
    /// directive on its line.
    #[must_use]
    pub fn standalone_indent(&self) -> Option<&'a str> {
        let line_start = self.text[..self.span.open_start]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        let indent = &self.text[line_start..self.span.open_start];
        if !is_blank(indent) {
            return None;
        }

        let after = &self.text[self.span.close_end..];
        let line_rest = after.find('\n').map_or(after, |i| &after[..i]);
        is_blank(line_rest.trim_end_matches('\r')).then_some(indent)
    }

    /// Whether the close directive is followed by a line break (after optional
    /// trailing whitespace).
    #[must_use]
    pub fn followed_by_line_break(&self) -> bool {
        let after = self.text[self.span.close_end..].trim_start_matches([' ', '\t']);
        after.starts_with('\n') || after.starts_with("\r\n")
    }

    /// Length of the horizontal whitespace after the close directive.
    pub(crate) fn trailing_blank_len(&self) -> usize {
        let after = &self.text[self.span.close_end..];
        after.len() - after.trim_start_matches([' ', '\t']).len()
    }

    /// Length of the horizontal whitespace and line break after the close
    /// directive, or 0 if no line break follows.
    pub(crate) fn line_end_len(&self) -> usize {
        let after = &self.text[self.span.close_end..];
        after.len() - strip_line_end(after).len()
    }

    /// Block content handed to handlers.
    ///
    /// For standalone blocks the remainder of the open directive's line and the
    /// close directive's indentation are not part of the content.
    #[must_use]
    pub fn content(&self) -> &'a str {
        let inner = self.inner();
        if self.standalone_indent().is_none() {
            return inner;
        }
        let inner = strip_line_end(inner);
        match inner.rfind('\n') {
            Some(i) if is_blank(&inner[i + 1..]) => {
                let body = &inner[..i];
                body.strip_suffix('\r').unwrap_or(body)
            }
            _ if is_blank(inner) => "",
            _ => inner,
        }
    }

    /// Line on which [`content`](Self::content) starts (1-indexed).
    #[must_use]
    pub fn content_line(&self) -> usize {
        let content_start = self.span.inner_start + self.leading_trim();
        self.line + count_newlines(&self.text[self.span.open_start..content_start])
    }

    fn leading_trim(&self) -> usize {
        if self.standalone_indent().is_none() {
            return 0;
        }
        let inner = self.inner();
        inner.len() - strip_line_end(inner).len()
    }

    /// First open directive of the stack.
    #[must_use]
    pub fn directive(&self) -> &Directive {
        &self.directives[0]
    }
}

/// A piece of scanned text.
#[derive(Clone, Debug)]
pub enum Segment<'a> {
    /// Text outside any block, passed through unchanged.
    Literal(&'a str),
    /// A build block.
    Block(Block<'a>),
}

/// Lazy scanner over one text buffer.
///
/// Yields [`Segment`]s in source order. After the first error the scanner is
/// exhausted.
pub struct BlockScanner<'g, 'a> {
    grammar: &'g DirectiveGrammar,
    text: &'a str,
    source: Option<&'a Path>,
    cursor: usize,
    lines: LineCounter,
    pending: Option<Block<'a>>,
    finished: bool,
}

struct RawToken {
    start: usize,
    end: usize,
    token: Token,
}

impl<'g, 'a> BlockScanner<'g, 'a> {
    /// Create a scanner over `text`.
    #[must_use]
    pub fn new(grammar: &'g DirectiveGrammar, text: &'a str) -> Self {
        Self {
            grammar,
            text,
            source: None,
            cursor: 0,
            lines: LineCounter::new(1),
            pending: None,
            finished: false,
        }
    }

    /// Set the file the text was read from, used in error locations.
    #[must_use]
    pub fn with_source(mut self, source: Option<&'a Path>) -> Self {
        self.source = source;
        self
    }

    /// Set the line number of the first line of `text`.
    #[must_use]
    pub fn with_first_line(mut self, line: usize) -> Self {
        self.lines = LineCounter::new(line);
        self
    }

    fn location(&mut self, offset: usize) -> Location {
        Location::new(self.source, self.lines.line_at(self.text, offset))
    }

    /// Next directive comment at or after `from`.
    fn token_at(&mut self, from: usize) -> Result<Option<RawToken>, ProcessError> {
        let Some((start, end)) = self.grammar.find(self.text, from) else {
            return Ok(None);
        };
        let text = self.text;
        let comment = &text[start..end];
        match self.grammar.classify(comment) {
            Ok(token) => Ok(Some(RawToken { start, end, token })),
            Err(reason) => Err(ProcessError::MalformedDirective {
                location: self.location(start),
                directive: comment.to_owned(),
                reason,
            }),
        }
    }

    /// Follow a run of open directives of `block_type` separated only by
    /// whitespace.
    ///
    /// Returns the end offset of the last directive in the run and the extra
    /// directives found after the one ending at `end`. An open directive of a
    /// different type starts a nested block instead, and so does a same-type one
    /// whose close directive is needed to balance the text that follows.
    fn stacked_after(
        &mut self,
        block_type: &str,
        end: usize,
    ) -> Result<(usize, Vec<Directive>), ProcessError> {
        let mut run: Vec<(Directive, usize)> = Vec::new();
        let mut run_end = end;
        while let Some(next) = self.token_at(run_end)? {
            let gap = &self.text[run_end..next.start];
            match next.token {
                Token::Open(directive)
                    if gap.trim().is_empty() && directive.block_type == block_type =>
                {
                    run_end = next.end;
                    run.push((directive, next.end));
                }
                _ => break,
            }
        }
        if run.is_empty() {
            return Ok((end, Vec::new()));
        }

        let opens = run.len() + 1;
        let stacked = self.unmatched_depth(run_end, opens).min(opens - 1);
        run.truncate(stacked);
        let end = run.last().map_or(end, |(_, end)| *end);
        Ok((end, run.into_iter().map(|(directive, _)| directive).collect()))
    }

    /// Lowest nesting depth reached after `from` when `depth` blocks are open
    /// there, stopping at 0 or at the first unparsable directive.
    fn unmatched_depth(&mut self, from: usize, mut depth: usize) -> usize {
        let mut lowest = depth;
        let mut pos = from;
        while let Ok(Some(token)) = self.token_at(pos) {
            match token.token {
                Token::Open(_) => depth += 1,
                Token::Close => {
                    depth -= 1;
                    lowest = lowest.min(depth);
                    if depth == 0 {
                        break;
                    }
                }
            }
            pos = token.end;
        }
        lowest
    }

    fn read_block(&mut self, first: RawToken) -> Result<Block<'a>, ProcessError> {
        let Token::Open(directive) = first.token else {
            return Err(ProcessError::MalformedDirective {
                location: self.location(first.start),
                directive: self.text[first.start..first.end].to_owned(),
                reason: "end marker without a matching open directive".to_owned(),
            });
        };

        let open_start = first.start;
        let line = self.lines.line_at(self.text, open_start);
        let (open_end, stacked) = self.stacked_after(&directive.block_type, first.end)?;
        let mut directives = Vec::with_capacity(1 + stacked.len());
        directives.push(directive);
        directives.extend(stacked);

        let mut depth = 1usize;
        let mut pos = open_end;
        let (close_start, close_end) = loop {
            let Some(token) = self.token_at(pos)? else {
                return Err(ProcessError::UnterminatedBlock {
                    location: Location::new(self.source, line),
                    block_type: directives[0].block_type.clone(),
                });
            };
            match token.token {
                Token::Open(nested) => {
                    depth += 1;
                    pos = self.stacked_after(&nested.block_type, token.end)?.0;
                }
                Token::Close => {
                    depth -= 1;
                    if depth == 0 {
                        break (token.start, token.end);
                    }
                    pos = token.end;
                }
            }
        };

        let end_marker = &self.text[close_start..close_end];
        for directive in &mut directives {
            end_marker.clone_into(&mut directive.end_marker);
        }

        Ok(Block {
            directives,
            span: BlockSpan {
                open_start,
                open_end,
                inner_start: open_end,
                inner_end: close_start,
                close_start,
                close_end,
            },
            line,
            text: self.text,
        })
    }
}

impl<'a> Iterator for BlockScanner<'_, 'a> {
    type Item = Result<Segment<'a>, ProcessError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(block) = self.pending.take() {
            return Some(Ok(Segment::Block(block)));
        }
        if self.finished {
            return None;
        }

        let block = match self.token_at(self.cursor) {
            Ok(Some(token)) => self.read_block(token),
            Ok(None) => {
                self.finished = true;
                let rest = &self.text[self.cursor..];
                self.cursor = self.text.len();
                return (!rest.is_empty()).then_some(Ok(Segment::Literal(rest)));
            }
            Err(err) => Err(err),
        };

        match block {
            Ok(block) => {
                let literal = &self.text[self.cursor..block.span.open_start];
                self.cursor = block.span.close_end;
                if literal.is_empty() {
                    Some(Ok(Segment::Block(block)))
                } else {
                    self.pending = Some(block);
                    Some(Ok(Segment::Literal(literal)))
                }
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Incremental byte-offset to line-number conversion.
///
/// Offsets are usually queried in increasing order; earlier offsets restart the
/// count from the beginning.
struct LineCounter {
    first_line: usize,
    offset: usize,
    line: usize,
}

impl LineCounter {
    fn new(first_line: usize) -> Self {
        Self {
            first_line,
            offset: 0,
            line: first_line,
        }
    }

    fn line_at(&mut self, text: &str, offset: usize) -> usize {
        if offset < self.offset {
            self.offset = 0;
            self.line = self.first_line;
        }
        self.line += count_newlines(&text[self.offset..offset]);
        self.offset = offset;
        self.line
    }
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t')
}

/// Strip horizontal whitespace followed by one line break from the start of `s`.
///
/// Returns `s` unchanged if it does not start with such a sequence.
pub(crate) fn strip_line_end(s: &str) -> &str {
    let trimmed = s.trim_start_matches([' ', '\t']);
    trimmed
        .strip_prefix("\r\n")
        .or_else(|| trimmed.strip_prefix('\n'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::DEFAULT_MARKER;

    fn scan(text: &str) -> Result<Vec<Segment<'_>>, ProcessError> {
        static GRAMMAR: std::sync::LazyLock<DirectiveGrammar> =
            std::sync::LazyLock::new(|| DirectiveGrammar::new(DEFAULT_MARKER).unwrap());
        BlockScanner::new(&GRAMMAR, text).collect()
    }

    fn blocks<'a>(segments: &'a [Segment<'a>]) -> Vec<&'a Block<'a>> {
        segments
            .iter()
            .filter_map(|s| match s {
                Segment::Block(b) => Some(b),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_no_directives() {
        let segments = scan("<p>plain</p>\n").unwrap();
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Literal("<p>plain</p>\n")));
    }

    #[test]
    fn test_empty_input() {
        assert!(scan("").unwrap().is_empty());
    }

    #[test]
    fn test_single_block_with_gaps() {
        let text = "a\n<!-- build:remove -->\nx\n<!-- endbuild -->\nb";
        let segments = scan(text).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[0], Segment::Literal("a\n")));
        assert!(matches!(segments[2], Segment::Literal("\nb")));

        let block = blocks(&segments)[0];
        assert_eq!(block.directive().block_type, "remove");
        assert_eq!(block.directive().end_marker, "<!-- endbuild -->");
        assert_eq!(block.line, 2);
        assert_eq!(block.inner(), "\nx\n");
        assert_eq!(block.content(), "x");
        assert_eq!(block.content_line(), 3);
    }

    #[test]
    fn test_span_invariants() {
        let text = "<!-- build:remove -->x<!-- endbuild -->";
        let segments = scan(text).unwrap();
        let span = blocks(&segments)[0].span;
        assert_eq!(span.open_start, 0);
        assert!(span.open_end <= span.inner_start);
        assert!(span.inner_start <= span.inner_end);
        assert!(span.inner_end <= span.close_start);
        assert_eq!(span.close_end, text.len());
        assert_eq!(blocks(&segments)[0].inner(), "x");
    }

    #[test]
    fn test_inline_block_content_is_exact() {
        let text = "<p>a<!-- build:remove --> x <!-- endbuild -->b</p>";
        let segments = scan(text).unwrap();
        let block = blocks(&segments)[0];
        assert!(block.standalone_indent().is_none());
        assert_eq!(block.content(), " x ");
    }

    #[test]
    fn test_standalone_indent() {
        let text = "<div>\n    <!-- build:remove -->\n    <p>x</p>\n    <!-- endbuild -->  \n</div>";
        let segments = scan(text).unwrap();
        let block = blocks(&segments)[0];
        assert_eq!(block.standalone_indent(), Some("    "));
        assert!(block.followed_by_line_break());
        assert_eq!(block.content(), "    <p>x</p>");
        assert_eq!(block.trailing_blank_len(), 2);
        assert_eq!(block.line_end_len(), 3);
    }

    #[test]
    fn test_empty_standalone_content() {
        let text = "<!-- build:remove -->\n<!-- endbuild -->\n";
        let segments = scan(text).unwrap();
        assert_eq!(blocks(&segments)[0].content(), "");
    }

    #[test]
    fn test_stacked_directives_share_block() {
        let text = "<!-- build:remove(mult_one) -->\n<!-- build:remove(mult_two) -->\n<p>x</p>\n<!-- endbuild -->\n";
        let segments = scan(text).unwrap();
        let found = blocks(&segments);
        assert_eq!(found.len(), 1);
        let targets: Vec<_> = found[0]
            .directives
            .iter()
            .map(|d| d.targets[0].as_str())
            .collect();
        assert_eq!(targets, vec!["mult_one", "mult_two"]);
        assert_eq!(found[0].content(), "<p>x</p>");
    }

    #[test]
    fn test_same_type_nested_at_block_start() {
        let text = "<!-- build:remove(dist) -->\n<!-- build:remove(dev) -->\nx\n<!-- endbuild -->\ny\n<!-- endbuild -->\n";
        let segments = scan(text).unwrap();
        let found = blocks(&segments);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].directives.len(), 1);
        assert_eq!(found[0].directive().targets, vec!["dist"]);
        assert!(found[0].content().starts_with("<!-- build:remove(dev) -->"));
        assert!(found[0].content().ends_with("y"));
    }

    #[test]
    fn test_stack_followed_by_nested_same_type() {
        let text = "<!-- build:remove(a) -->\n<!-- build:remove(b) -->\n<!-- build:remove(c) -->\nx\n<!-- endbuild -->\ny\n<!-- endbuild -->\n<!-- build:remove(d) -->z<!-- endbuild -->";
        let segments = scan(text).unwrap();
        let found = blocks(&segments);
        assert_eq!(found.len(), 2);
        let targets: Vec<_> = found[0]
            .directives
            .iter()
            .map(|d| d.targets[0].as_str())
            .collect();
        assert_eq!(targets, vec!["a", "b"]);
        assert!(found[0].content().starts_with("<!-- build:remove(c) -->"));
        assert_eq!(found[1].inner(), "z");
    }

    #[test]
    fn test_stack_before_later_stack() {
        let text = "<!-- build:remove(a) --><!-- build:remove(b) -->x<!-- endbuild -->\n<!-- build:remove(c) --><!-- build:remove(d) -->y<!-- endbuild -->";
        let segments = scan(text).unwrap();
        let found = blocks(&segments);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].directives.len(), 2);
        assert_eq!(found[1].directives.len(), 2);
        assert_eq!(found[1].inner(), "y");
    }

    #[test]
    fn test_nested_blocks_stay_inside_outer() {
        let text = "<!-- build:remove(dist) -->\n<!-- build:include a.html -->\n<!-- endbuild -->\n<p>x</p>\n<!-- endbuild -->\ntail";
        let segments = scan(text).unwrap();
        let found = blocks(&segments);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].directives.len(), 1);
        assert!(found[0].content().contains("build:include a.html"));
        assert!(found[0].content().contains("<p>x</p>"));
        assert!(matches!(segments.last(), Some(Segment::Literal("\ntail"))));
    }

    #[test]
    fn test_sibling_blocks() {
        let text = "<!-- build:remove -->a<!-- endbuild -->|<!-- build:remove -->b<!-- /build -->";
        let segments = scan(text).unwrap();
        let found = blocks(&segments);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].inner(), "a");
        assert_eq!(found[1].inner(), "b");
        assert!(found[0].span.close_end <= found[1].span.open_start);
    }

    #[test]
    fn test_unterminated_block_reports_line() {
        let text = "line 1\nline 2\n<!-- build:remove -->\nx\n";
        let err = scan(text).unwrap_err();
        match err {
            ProcessError::UnterminatedBlock {
                location,
                block_type,
            } => {
                assert_eq!(location.line, 3);
                assert_eq!(block_type, "remove");
            }
            other => panic!("expected unterminated block, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_nested_block() {
        let text = "<!-- build:remove -->\nx\n<!-- build:remove -->\ny\n<!-- endbuild -->\n";
        assert!(matches!(
            scan(text),
            Err(ProcessError::UnterminatedBlock { .. })
        ));
    }

    #[test]
    fn test_stray_end_marker() {
        let text = "a\n<!-- endbuild -->\n";
        let err = scan(text).unwrap_err();
        assert!(matches!(err, ProcessError::MalformedDirective { .. }));
        assert_eq!(err.location().map(|l| l.line), Some(2));
    }

    #[test]
    fn test_malformed_directive_reports_line() {
        let text = "\n\n<!-- build:remove(dist -->\n<!-- endbuild -->";
        let err = scan(text).unwrap_err();
        assert!(matches!(err, ProcessError::MalformedDirective { .. }));
        assert_eq!(err.location().map(|l| l.line), Some(3));
    }

    #[test]
    fn test_conditional_comment_is_literal() {
        let text = "<!--[if lt IE 9]>\n<!-- build:remove -->\n<script></script>\n<!-- endbuild -->\n<![endif]-->";
        let segments = scan(text).unwrap();
        assert!(matches!(segments[0], Segment::Literal("<!--[if lt IE 9]>\n")));
        assert_eq!(blocks(&segments).len(), 1);
        assert!(matches!(segments.last(), Some(Segment::Literal("\n<![endif]-->"))));
    }

    #[test]
    fn test_first_line_offset() {
        static GRAMMAR: std::sync::LazyLock<DirectiveGrammar> =
            std::sync::LazyLock::new(|| DirectiveGrammar::new(DEFAULT_MARKER).unwrap());
        let err = BlockScanner::new(&GRAMMAR, "\n<!-- build:remove -->")
            .with_first_line(10)
            .with_source(Some(Path::new("page.html")))
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(err.to_string(), "page.html:11: unterminated `remove` block (missing end marker)");
    }

    #[test]
    fn test_strip_line_end() {
        assert_eq!(strip_line_end("  \nrest"), "rest");
        assert_eq!(strip_line_end("\r\nrest"), "rest");
        assert_eq!(strip_line_end("rest"), "rest");
        assert_eq!(strip_line_end("  rest"), "  rest");
    }
}
