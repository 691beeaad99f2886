//! Processing engine.
//!
//! Scans a source text, processes nested blocks before their enclosing block's
//! handler sees the content, re-processes included files when recursion is on,
//! and applies the template engine to the assembled output. Handler output is
//! never scanned again.
//!
//! # Layout
//!
//! Directive comments never reach the output. When a block's directives sit on
//! lines of their own:
//!
//! - an empty result removes those lines entirely, leaving a single line break
//!   at the junction;
//! - replacement markup (`Replace`, `Include`) is indented like the open
//!   directive;
//! - kept or rewritten content keeps its own indentation.
//!
//! Blocks sharing a line with other markup are replaced in place.

use std::io;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::context::{BlockContext, ReadFileFn};
use crate::error::{Location, ProcessError};
use crate::grammar::DirectiveGrammar;
use crate::handler::BlockHandler;
use crate::matcher::EnvironmentMatcher;
use crate::options::ProcessOptions;
use crate::output::BlockOutput;
use crate::registry::BlockRegistry;
use crate::scanner::{Block, BlockScanner, Segment};
use crate::template::{DelimiterTemplate, TemplateEngine};
use crate::transform::{AssetTransform, PassthroughTransform};

/// Collaborators used by a [`Processor`].
#[derive(Default)]
pub struct ProcessorConfig {
    /// Callback to read source, include, asset and handler source files.
    ///
    /// Default: `std::fs::read_to_string`
    pub read_file: Option<Box<ReadFileFn>>,
    /// Transform applied to inlined assets.
    ///
    /// Default: [`PassthroughTransform`]
    pub transform: Option<Box<dyn AssetTransform>>,
    /// Template engine applied to each top-level output.
    ///
    /// Default: [`DelimiterTemplate`] built from the `interpolate` option.
    pub template: Option<Box<dyn TemplateEngine>>,
}

impl ProcessorConfig {
    /// Create a configuration with default collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file reading callback.
    #[must_use]
    pub fn with_read_file<F>(mut self, read_file: F) -> Self
    where
        F: Fn(&Path) -> io::Result<String> + Send + Sync + 'static,
    {
        self.read_file = Some(Box::new(read_file));
        self
    }

    /// Set the asset transform.
    #[must_use]
    pub fn with_transform<T: AssetTransform + 'static>(mut self, transform: T) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Set the template engine.
    #[must_use]
    pub fn with_template<T: TemplateEngine + 'static>(mut self, template: T) -> Self {
        self.template = Some(Box::new(template));
        self
    }
}

/// Default file reading function.
fn default_read_file(path: &Path) -> io::Result<String> {
    std::fs::read_to_string(path)
}

/// Result of processing one source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessResult {
    /// Rewritten text.
    pub output: String,
    /// Non-fatal problems, each prefixed with its location.
    pub warnings: Vec<String>,
}

/// Build-block processor.
///
/// Holds everything that stays fixed for an invocation: options, grammar,
/// registry and collaborators. A processor is immutable once built and can be
/// shared across threads; each call gets its own inclusion chain and warnings.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use buildblock_engine::{ProcessOptions, Processor};
///
/// let options = ProcessOptions::default().with_environment("dist");
/// let processor = Processor::new(options).unwrap();
///
/// let input = "<p>a</p>\n<!-- build:remove(dist) -->\n<script src=\"dev.js\"></script>\n<!-- endbuild -->\n<p>b</p>\n";
/// let result = processor.process_str(input, Path::new(".")).unwrap();
/// assert_eq!(result.output, "<p>a</p>\n<p>b</p>\n");
/// ```
pub struct Processor {
    options: ProcessOptions,
    grammar: DirectiveGrammar,
    matcher: EnvironmentMatcher,
    registry: BlockRegistry,
    read_file: Box<ReadFileFn>,
    transform: Box<dyn AssetTransform>,
    template: Box<dyn TemplateEngine>,
    template_data: Value,
}

impl Processor {
    /// Create a processor with default collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are unusable: invalid comment marker,
    /// invalid interpolate pattern, or a custom handler source that fails to
    /// load.
    pub fn new(options: ProcessOptions) -> Result<Self, ProcessError> {
        Self::with_config(options, ProcessorConfig::default())
    }

    /// Create a processor with custom collaborators.
    ///
    /// # Errors
    ///
    /// Same as [`Processor::new`].
    pub fn with_config(
        options: ProcessOptions,
        config: ProcessorConfig,
    ) -> Result<Self, ProcessError> {
        let grammar = DirectiveGrammar::new(&options.comment_marker)
            .ok_or_else(|| ProcessError::InvalidMarker(options.comment_marker.clone()))?;

        let template: Box<dyn TemplateEngine> = match config.template {
            Some(template) => template,
            None => Box::new(DelimiterTemplate::new(
                &options.template_settings.interpolate,
            )?),
        };
        let read_file: Box<ReadFileFn> = match config.read_file {
            Some(read_file) => read_file,
            None => Box::new(default_read_file),
        };
        let transform: Box<dyn AssetTransform> = match config.transform {
            Some(transform) => transform,
            None => Box::new(PassthroughTransform),
        };

        let mut registry = BlockRegistry::with_builtins();
        for source in &options.custom_block_types {
            registry.load_source(source, &*read_file)?;
        }

        Ok(Self {
            matcher: EnvironmentMatcher::new(options.environment.as_deref(), options.strip),
            template_data: options.template_data(),
            options,
            grammar,
            registry,
            read_file,
            transform,
            template,
        })
    }

    /// Register a handler, overriding any handler of the same name.
    #[must_use]
    pub fn with_handler<H: BlockHandler + 'static>(mut self, handler: H) -> Self {
        self.registry.register(handler);
        self
    }

    /// Block registry in use.
    #[must_use]
    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Mutable access to the block registry.
    pub fn registry_mut(&mut self) -> &mut BlockRegistry {
        &mut self.registry
    }

    /// Options the processor was built with.
    #[must_use]
    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Process a source file. Includes resolve against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or any block in it (or in a
    /// recursively included file) fails.
    pub fn process_file(&self, path: &Path) -> Result<ProcessResult, ProcessError> {
        let text = (self.read_file)(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ProcessError::FileNotFound(path.to_path_buf()),
            _ => ProcessError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        tracing::debug!(path = %path.display(), "Processing file");

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mut run = Run::new(self);
        run.chain.push(normalize_path(path));
        let output = run.expand(&text, Some(path), base_dir, 1)?;
        Ok(run.finish(&output, Some(path)))
    }

    /// Process text that did not come from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if any block fails.
    pub fn process_str(&self, text: &str, base_dir: &Path) -> Result<ProcessResult, ProcessError> {
        let mut run = Run::new(self);
        let output = run.expand(text, None, base_dir, 1)?;
        Ok(run.finish(&output, None))
    }
}

/// State of one top-level processing call.
struct Run<'p> {
    processor: &'p Processor,
    /// Normalized paths of the files currently open, outermost first.
    chain: Vec<PathBuf>,
    /// Number of nested includes being processed.
    depth: usize,
    warnings: Vec<String>,
}

/// Rendered block text and whether it is replacement markup to be indented.
struct Rendered {
    text: String,
    indent: bool,
}

impl Rendered {
    fn plain(text: String) -> Self {
        Self {
            text,
            indent: false,
        }
    }

    fn indented(text: String) -> Self {
        Self { text, indent: true }
    }
}

impl<'p> Run<'p> {
    fn new(processor: &'p Processor) -> Self {
        Self {
            processor,
            chain: Vec::new(),
            depth: 0,
            warnings: Vec::new(),
        }
    }

    fn finish(mut self, output: &str, source: Option<&Path>) -> ProcessResult {
        let processor = self.processor;
        let mut template_warnings = Vec::new();
        let output = processor
            .template
            .render(output, &processor.template_data, &mut template_warnings);

        let origin = source.map_or_else(|| "<input>".to_owned(), |p| p.display().to_string());
        self.warnings
            .extend(template_warnings.into_iter().map(|w| format!("{origin}: {w}")));

        ProcessResult {
            output,
            warnings: self.warnings,
        }
    }

    /// Expand every block of `text`.
    fn expand(
        &mut self,
        text: &str,
        source: Option<&Path>,
        base_dir: &Path,
        first_line: usize,
    ) -> Result<String, ProcessError> {
        let processor = self.processor;
        let scanner = BlockScanner::new(&processor.grammar, text)
            .with_source(source)
            .with_first_line(first_line);

        let mut out = String::with_capacity(text.len());
        // Bytes at the start of the next literal already consumed by a block.
        let mut skip = 0;
        for segment in scanner {
            match segment? {
                Segment::Literal(literal) => {
                    out.push_str(literal.get(skip..).unwrap_or_default());
                    skip = 0;
                }
                Segment::Block(block) => {
                    let rendered = self.render_block(&block, source, base_dir)?;
                    skip = emit(&mut out, &block, &rendered);
                }
            }
        }
        Ok(out)
    }

    fn render_block(
        &mut self,
        block: &Block<'_>,
        source: Option<&Path>,
        base_dir: &Path,
    ) -> Result<Rendered, ProcessError> {
        let processor = self.processor;
        let location = Location::new(source, block.line);

        for directive in &block.directives {
            if !processor.registry.contains(&directive.block_type) {
                return Err(ProcessError::UnknownBlockType {
                    location,
                    block_type: directive.block_type.clone(),
                });
            }
        }

        let content = block.content();
        let content_line = block.content_line();

        let Some(directive) = processor.matcher.select(&block.directives) else {
            tracing::debug!(
                block_type = %block.directive().block_type,
                line = block.line,
                "No directive matches environment, keeping content"
            );
            let kept = self.expand(content, source, base_dir, content_line)?;
            return Ok(Rendered::plain(kept));
        };

        let handler = processor.registry.get(&directive.block_type).ok_or_else(|| {
            ProcessError::UnknownBlockType {
                location: location.clone(),
                block_type: directive.block_type.clone(),
            }
        })?;

        let expanded = if handler.reads_content(directive) {
            Some(self.expand(content, source, base_dir, content_line)?)
        } else {
            None
        };

        let mut ctx = BlockContext::new(base_dir, &*processor.read_file)
            .with_source_path(source)
            .with_line(block.line)
            .with_environment(processor.matcher.environment())
            .with_config(&processor.options.config)
            .with_transform(&*processor.transform)
            .with_template(&*processor.template, &processor.template_data);
        let output = handler.handle(expanded.as_deref().unwrap_or(content), directive, &mut ctx);
        self.warnings.extend(ctx.into_warnings());
        let output = output?;

        tracing::debug!(
            block_type = %directive.block_type,
            line = block.line,
            "Dispatched block"
        );

        Ok(match output {
            BlockOutput::Keep => match expanded {
                Some(kept) => Rendered::plain(kept),
                None => Rendered::plain(self.expand(content, source, base_dir, content_line)?),
            },
            BlockOutput::Drop => Rendered::plain(String::new()),
            BlockOutput::Rewrite(text) => Rendered::plain(text),
            BlockOutput::Replace(text) => Rendered::indented(text),
            BlockOutput::Include { path, content } => {
                let included = self.include(&path, content, location)?;
                Rendered::indented(trim_line_break(&included).to_owned())
            }
        })
    }

    /// Process an included file's content when recursion is enabled.
    fn include(
        &mut self,
        path: &Path,
        content: String,
        location: Location,
    ) -> Result<String, ProcessError> {
        let processor = self.processor;
        if !processor.options.recursive {
            return Ok(content);
        }

        let normalized = normalize_path(path);
        if self.chain.contains(&normalized) || self.depth >= processor.options.max_include_depth
        {
            let mut chain = self.chain.clone();
            chain.push(normalized);
            return Err(ProcessError::IncludeCycle { location, chain });
        }

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        self.chain.push(normalized);
        self.depth += 1;
        let result = self.expand(&content, Some(path), base_dir, 1);
        self.depth -= 1;
        self.chain.pop();
        result
    }
}

/// Append a rendered block to `out`, applying the layout rules.
///
/// Returns how many bytes of the text following the block were consumed.
fn emit(out: &mut String, block: &Block<'_>, rendered: &Rendered) -> usize {
    let Some(indent) = block.standalone_indent() else {
        out.push_str(&rendered.text);
        return 0;
    };

    if out.ends_with(indent) {
        out.truncate(out.len() - indent.len());
    }

    if rendered.text.is_empty() {
        if block.followed_by_line_break() {
            return block.line_end_len();
        }
        // Last line of the text: drop the line break before the block instead.
        if out.ends_with('\n') {
            out.pop();
            if out.ends_with('\r') {
                out.pop();
            }
        }
        return block.trailing_blank_len();
    }

    if rendered.indent {
        push_indented(out, &rendered.text, indent);
    } else {
        out.push_str(&rendered.text);
    }
    block.trailing_blank_len()
}

/// Append `text` with every non-blank line prefixed by `indent`.
fn push_indented(out: &mut String, text: &str, indent: &str) {
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            out.push_str(indent);
        }
        out.push_str(line);
    }
}

fn trim_line_break(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}

/// Lexically normalize a path: drop `.` components and fold `..` into their
/// parent where possible.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
