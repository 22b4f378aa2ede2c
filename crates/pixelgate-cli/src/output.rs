//! Output formatting for verdicts and comparisons

use console::{style, Style, Term};
use pixelgate::{HybridResult, ValidationRecord, ValidationStatus};

/// Terminal reporter for command results
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter writing to stdout
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    fn line(&self, text: &str) {
        log_write_error(self.term.write_line(text));
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

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        self.line(&format!("{prefix} {message}"));
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

        self.line(&format!("{prefix} {message}"));
    }

    /// Print an indented detail line
    pub fn detail(&self, label: &str, value: &str) {
        if self.quiet {
            return;
        }
        let label = if self.use_color {
            Style::new().dim().apply_to(label).to_string()
        } else {
            label.to_string()
        };
        self.line(&format!("    {label}: {value}"));
    }

    /// Print a validation record
    pub fn verdict(&self, record: &ValidationRecord) {
        let headline = format!("[{}] {}", record.status, record.message);
        match record.status {
            ValidationStatus::Success | ValidationStatus::BaselineCreated => self.success(&headline),
            ValidationStatus::Failure | ValidationStatus::Error => self.failure(&headline),
            ValidationStatus::Warning => self.warning(&headline),
            ValidationStatus::Skipped | ValidationStatus::Ignored => self.info(&headline),
        }

        if let Some(strategy) = record.strategy {
            self.detail("strategy", strategy.as_str());
        }
        if record.diff_ratio.is_some() {
            self.detail("severity", &record.severity.to_string());
        }
        if let Some(similarity) = record.similarity {
            self.detail("similarity", &format!("{similarity:.4}"));
        }
        for (label, path) in [
            ("baseline", &record.baseline_path),
            ("actual", &record.actual_path),
            ("diff", &record.diff_path),
        ] {
            if let Some(path) = path {
                self.detail(label, &path.display().to_string());
            }
        }
        self.detail("elapsed", &format!("{}ms", record.elapsed_ms));
    }

    /// Print a hybrid comparison
    pub fn comparison(&self, result: &HybridResult) {
        let cmp = &result.comparison;
        let headline = format!(
            "{:.2}% different (tolerance {:.2}%, {})",
            cmp.diff_percent(),
            cmp.tolerance * 100.0,
            result.strategy
        );
        if result.matches {
            self.success(&headline);
        } else {
            self.failure(&headline);
        }

        self.detail(
            "pixels",
            &format!("{} of {} differ", cmp.diff_pixel_count, cmp.total_pixels),
        );
        if cmp.was_scaled {
            let (w, h) = cmp.actual_dimensions;
            let (bw, bh) = cmp.baseline_dimensions;
            self.detail(
                "scaled",
                &format!("{w}x{h} -> {bw}x{bh} (factor {:.3})", cmp.scale_factor),
            );
        }
        if let Some(similarity) = result.similarity() {
            self.detail("similarity", &format!("{similarity:.4}"));
        }
        if let Some(error) = result.model_error() {
            self.detail("model error", error);
        }
        self.detail("regions", &cmp.regions.len().to_string());
    }
}

/// Report output is best effort; a closed stdout must not abort the command
fn log_write_error(result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "failed to write report line");
            false
        }
    }
}
