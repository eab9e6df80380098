//! Colored terminal output utilities.

use console::{Style, Term};
use sd_site::PassSummary;

/// Terminal output formatter (writes to stderr).
pub(crate) struct Output {
    term: Term,
    label: Style,
    good: Style,
    bad: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            label: Style::new().cyan().bold(),
            good: Style::new().green(),
            bad: Style::new().red(),
        }
    }

    /// Print `label: value` with the label highlighted.
    pub(crate) fn setting(&self, label: &str, value: impl std::fmt::Display) {
        let _ = self
            .term
            .write_line(&format!("{} {value}", self.label.apply_to(format!("{label}:"))));
    }

    /// Print the outcome of a processing pass; red when files failed.
    pub(crate) fn pass_summary(&self, summary: &PassSummary) {
        let style = if summary.failed == 0 { &self.good } else { &self.bad };
        let line = format!(
            "Compiled {} documents ({} failed, {} removed) in {} contexts",
            summary.compiled, summary.failed, summary.removed, summary.contexts
        );
        let _ = self.term.write_line(&style.apply_to(line).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.bad.apply_to(msg).to_string());
    }
}
