//! Output formatting and progress reporting

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use stepwise::{JourneyReport, JourneyState};

/// Progress reporter for a journey run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Spin while the journey runs; skipped when logs would interleave
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(spinner);
    }

    /// Stop the spinner
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// One line per recorded step, then the verdict
    pub fn summary(&self, report: &JourneyReport) {
        for step in &report.steps {
            let verification = step.verification.as_ref().map(|v| v.to_string());
            let line = step_line(step.state, verification, step.note.as_deref());
            if step.state == JourneyState::Failed {
                self.failure(&line);
            } else {
                self.success(&line);
            }
        }
        let took = report
            .duration_ms()
            .map_or_else(String::new, |ms| format!(" in {:.2}s", ms as f64 / 1000.0));
        if report.succeeded() {
            self.success(&format!("journey for {:?} completed{took}", report.query));
        } else {
            self.failure(&format!(
                "journey for {:?} stopped at {}{took}",
                report.query,
                report.final_url.as_deref().unwrap_or("<unknown>")
            ));
        }
    }
}

fn step_line(state: JourneyState, verification: Option<String>, note: Option<&str>) -> String {
    let mut line = state.to_string();
    if let Some(v) = verification {
        line.push_str(": ");
        line.push_str(&v);
    }
    if let Some(note) = note {
        line.push_str(" [");
        line.push_str(note);
        line.push(']');
    }
    line
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_step_line_plain() {
        assert_eq!(step_line(JourneyState::CatalogReady, None, None), "catalog-ready");
    }

    #[test]
    fn test_step_line_with_note() {
        let line = step_line(
            JourneyState::CatalogReady,
            Some("catalog-ready matched after 10ms".into()),
            Some("cookies cleared"),
        );
        assert_eq!(line, "catalog-ready: catalog-ready matched after 10ms [cookies cleared]");
    }

    #[test]
    fn test_quiet_reporter_never_spins() {
        let mut reporter = ProgressReporter::new(false, true);
        reporter.start_spinner("running");
        assert!(reporter.spinner.is_none());
        reporter.finish();
    }

    #[test]
    fn test_summary_of_failed_report() {
        let mut report = JourneyReport::new("python");
        report.fail(&stepwise::JourneyError::absent("no result cards", "https://stepik.org"));
        report.finish("https://stepik.org/catalog/search?q=python");
        ProgressReporter::new(false, true).summary(&report);
    }
}
