//! Colored terminal output utilities.

use buildblock_engine::BatchReport;
use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        self.styled(&self.yellow, msg);
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        self.styled(&self.red, msg);
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        self.styled(&self.cyan_bold, msg);
    }

    /// Print written files, warnings and failures of a batch.
    pub(crate) fn report(&self, report: &BatchReport) {
        for path in &report.written {
            self.styled(&self.green, &format!("  wrote {}", path.display()));
        }
        for warning in &report.warnings {
            self.warning(&format!("  warning: {warning}"));
        }
        for failure in &report.failures {
            self.error(&format!(
                "  failed {}: {}",
                failure.path.display(),
                failure.error
            ));
        }
    }

    fn styled(&self, style: &Style, msg: &str) {
        let _ = self.term.write_line(&style.apply_to(msg).to_string());
    }
}
