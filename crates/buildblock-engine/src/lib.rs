//! Build-block directive processing for HTML sources.
//!
//! Source files mark regions with comment directives:
//!
//! ```html
//! <!-- build:remove(dist) -->
//! <script src="js/livereload.js"></script>
//! <!-- endbuild -->
//! ```
//!
//! The [`Processor`] rewrites such files for a target environment: it removes,
//! keeps, includes, inlines or transforms each block according to its type, and
//! applies template substitution to the result.
//!
//! # Architecture
//!
//! - [`DirectiveGrammar`]: parses one directive comment into a [`Directive`].
//! - [`BlockScanner`]: lazily splits a text into literal gaps and [`Block`]s.
//! - [`EnvironmentMatcher`]: decides which stacked directive applies.
//! - [`BlockRegistry`]: maps block types to [`BlockHandler`]s. Built-ins live in
//!   [`handlers`]; declarative ones are loaded by [`custom`].
//! - [`Processor`]: orchestrates the above, recursing into included files.
//! - [`batch`]: runs [`Invocation`]s over many files in parallel.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use buildblock_engine::{ProcessOptions, Processor};
//!
//! let processor = Processor::new(ProcessOptions::default().with_environment("dist")).unwrap();
//! let input = "<head>\n  <!-- build:js js/app.min.js -->\n  <script src=\"js/a.js\"></script>\n  <!-- endbuild -->\n</head>\n";
//!
//! let result = processor.process_str(input, Path::new(".")).unwrap();
//! assert_eq!(result.output, "<head>\n  <script src=\"js/app.min.js\"></script>\n</head>\n");
//! ```

pub mod batch;
mod context;
pub mod custom;
mod error;
mod grammar;
mod handler;
pub mod handlers;
mod matcher;
mod options;
mod output;
mod processor;
mod registry;
mod scanner;
mod template;
mod transform;

pub use batch::{BatchReport, FileFailure, Invocation};
pub use context::{BlockContext, ReadFileFn};
pub use custom::{DeclarativeHandler, HandlerSourceError};
pub use error::{Location, ProcessError};
pub use grammar::{
    DEFAULT_MARKER, Directive, DirectiveGrammar, Token, is_valid_block_type, is_valid_marker,
};
pub use handler::BlockHandler;
pub use matcher::EnvironmentMatcher;
pub use options::{DEFAULT_MAX_INCLUDE_DEPTH, ProcessOptions, TemplateSettings};
pub use output::BlockOutput;
pub use processor::{ProcessResult, Processor, ProcessorConfig};
pub use registry::BlockRegistry;
pub use scanner::{Block, BlockScanner, BlockSpan, Segment};
pub use template::{DEFAULT_INTERPOLATE, DelimiterTemplate, TemplateEngine, TemplateError};
pub use transform::{AssetKind, AssetTransform, PassthroughTransform, TransformError};
