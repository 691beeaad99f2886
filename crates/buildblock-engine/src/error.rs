//! Error types for block processing.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::custom::HandlerSourceError;
use crate::template::TemplateError;

/// Position of a directive in a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// File the directive was read from, if the text came from a file.
    pub file: Option<PathBuf>,
    /// Line of the directive (1-indexed).
    pub line: usize,
}

impl Location {
    /// Create a location for `line` in an optional file.
    #[must_use]
    pub fn new(file: Option<&Path>, line: usize) -> Self {
        Self {
            file: file.map(Path::to_path_buf),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file.display(), self.line),
            None => write!(f, "<input>:{}", self.line),
        }
    }
}

/// Error returned when processing a source file fails.
///
/// Directive-related variants are fatal to the file containing the failing
/// directive and carry its [`Location`]. The remaining variants concern source
/// files and processor setup.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Top-level source file does not exist.
    #[error("Source file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O error reading a source file.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Directive comment could not be parsed.
    #[error("{location}: malformed directive `{directive}`: {reason}")]
    MalformedDirective {
        /// Where the directive appears.
        location: Location,
        /// Raw directive comment.
        directive: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Open directive without a matching close directive.
    #[error("{location}: unterminated `{block_type}` block (missing end marker)")]
    UnterminatedBlock {
        /// Where the open directive appears.
        location: Location,
        /// Block type of the open directive.
        block_type: String,
    },

    /// Block type has no registered handler.
    #[error("{location}: unknown block type `{block_type}`")]
    UnknownBlockType {
        /// Where the directive appears.
        location: Location,
        /// Unregistered block type.
        block_type: String,
    },

    /// Included file could not be read.
    #[error("{location}: included file not found: {}", path.display())]
    IncludeNotFound {
        /// Where the include directive appears.
        location: Location,
        /// Resolved path of the missing file.
        path: PathBuf,
    },

    /// Included file exists but could not be read.
    #[error("{location}: cannot read included file {}: {source}", path.display())]
    IncludeRead {
        /// Where the include directive appears.
        location: Location,
        /// Resolved path of the unreadable file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Include chain re-enters a file that is already open, or grows too deep.
    #[error("{location}: include cycle detected: {}", format_chain(chain))]
    IncludeCycle {
        /// Where the offending include directive appears.
        location: Location,
        /// Files on the active inclusion chain, outermost first, ending with the
        /// file that could not be entered.
        chain: Vec<PathBuf>,
    },

    /// A custom handler source failed validation.
    #[error(transparent)]
    HandlerSource(#[from] HandlerSourceError),

    /// Comment marker is not a plain keyword.
    #[error("Invalid comment marker `{0}`: expected ASCII letters, digits, `-` or `_`")]
    InvalidMarker(String),

    /// Template settings are unusable.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl ProcessError {
    /// Location of the failing directive, if the error is tied to one.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::MalformedDirective { location, .. }
            | Self::UnterminatedBlock { location, .. }
            | Self::UnknownBlockType { location, .. }
            | Self::IncludeNotFound { location, .. }
            | Self::IncludeRead { location, .. }
            | Self::IncludeCycle { location, .. } => Some(location),
            Self::FileNotFound(_)
            | Self::Io { .. }
            | Self::HandlerSource(_)
            | Self::InvalidMarker(_)
            | Self::Template(_) => None,
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
