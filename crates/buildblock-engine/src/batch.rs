//! Batch processing of invocations.
//!
//! Sources of an invocation are processed in parallel on the global rayon
//! thread pool, sharing one [`Processor`]. Failures are collected per file and
//! never stop the other sources.

use std::fs;
use std::io;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use rayon::prelude::*;

use crate::error::ProcessError;
use crate::processor::{ProcessResult, Processor};

/// One processing job: a list of sources and where their output goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Source files, in order.
    pub src: Vec<PathBuf>,
    /// Destination file, or directory when it ends with a path separator or
    /// already exists as a directory.
    pub dest: PathBuf,
}

impl Invocation {
    /// Create an invocation.
    #[must_use]
    pub fn new(src: Vec<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            src,
            dest: dest.into(),
        }
    }

    /// Whether each source gets its own output file under `dest`.
    #[must_use]
    pub fn dest_is_dir(&self) -> bool {
        let dest = self.dest.as_os_str().to_string_lossy();
        dest.ends_with('/') || dest.ends_with(MAIN_SEPARATOR) || self.dest.is_dir()
    }
}

/// A source that could not be processed or written.
#[derive(Debug)]
pub struct FileFailure {
    /// Source (or destination, for write failures) path.
    pub path: PathBuf,
    /// What went wrong.
    pub error: ProcessError,
}

/// Outcome of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files written, in source order.
    pub written: Vec<PathBuf>,
    /// Per-file failures, in source order.
    pub failures: Vec<FileFailure>,
    /// Non-fatal problems from every processed source.
    pub warnings: Vec<String>,
}

impl BatchReport {
    /// Whether every source was processed and written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_write(&mut self, path: &Path, content: &str) {
        match write_output(path, content) {
            Ok(()) => self.written.push(path.to_path_buf()),
            Err(error) => self.failures.push(FileFailure {
                path: path.to_path_buf(),
                error,
            }),
        }
    }

    fn merge(&mut self, other: Self) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
        self.warnings.extend(other.warnings);
    }
}

/// Run every invocation with one processor, in order.
#[must_use]
pub fn run_all(processor: &Processor, invocations: &[Invocation]) -> BatchReport {
    let mut report = BatchReport::default();
    for invocation in invocations {
        report.merge(run(processor, invocation));
    }
    report
}

/// Process the sources of one invocation and write the output.
///
/// In directory mode each processed source is written to `dest/<file name>`.
/// Otherwise all outputs are concatenated in source order into `dest`, and
/// nothing is written if any source failed.
#[must_use]
pub fn run(processor: &Processor, invocation: &Invocation) -> BatchReport {
    let results: Vec<(&PathBuf, Result<ProcessResult, ProcessError>)> = invocation
        .src
        .par_iter()
        .map(|src| (src, processor.process_file(src)))
        .collect();

    let mut report = BatchReport::default();
    let mut outputs = Vec::with_capacity(results.len());
    for (src, result) in results {
        match result {
            Ok(result) => {
                report.warnings.extend(result.warnings);
                outputs.push((src, result.output));
            }
            Err(error) => {
                tracing::warn!(path = %src.display(), error = %error, "Failed to process file");
                report.failures.push(FileFailure {
                    path: src.clone(),
                    error,
                });
            }
        }
    }

    if invocation.dest_is_dir() {
        for (src, output) in outputs {
            let Some(file_name) = src.file_name() else {
                report.failures.push(FileFailure {
                    path: src.clone(),
                    error: ProcessError::Io {
                        path: src.clone(),
                        source: io::Error::new(io::ErrorKind::InvalidInput, "no file name"),
                    },
                });
                continue;
            };
            report.record_write(&invocation.dest.join(file_name), &output);
        }
        return report;
    }

    if !report.is_success() {
        tracing::warn!(
            dest = %invocation.dest.display(),
            failed = report.failures.len(),
            "Not writing concatenated output"
        );
        return report;
    }
    if outputs.is_empty() {
        return report;
    }

    let concatenated = concatenate(outputs.iter().map(|(_, output)| output.as_str()));
    report.record_write(&invocation.dest, &concatenated);
    report
}

/// Join outputs, inserting a line break where an output does not end with one.
fn concatenate<'a>(outputs: impl Iterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for output in outputs {
        if !joined.is_empty() && !joined.ends_with('\n') {
            joined.push('\n');
        }
        joined.push_str(output);
    }
    joined
}

fn write_output(path: &Path, content: &str) -> Result<(), ProcessError> {
    let io_error = |source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, content).map_err(io_error)?;
    tracing::info!(path = %path.display(), "Wrote file");
    Ok(())
}
