use crate::error::InstallerError;
use dialoguer::console::style;
use std::path::Path;

/// Human-facing progress output. Everything goes to stderr so stdout stays
/// free for machine-readable results.
#[derive(Debug, Clone, Copy)]
pub struct Ui {
    quiet: bool,
}

impl Ui {
    pub const ARROW: &'static str = "==>";
    pub const BULLET: &'static str = "•";

    pub fn new() -> Self {
        Self { quiet: false }
    }

    /// Suppresses progress lines; errors are still printed.
    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    pub fn step(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style(Self::ARROW).cyan().bold(), style(message).bold());
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style(Self::ARROW).green().bold(), message);
        }
    }

    pub fn detail(&self, message: &str) {
        if !self.quiet {
            eprintln!("    {}", style(message).dim());
        }
    }

    pub fn item(&self, path: &Path) {
        if !self.quiet {
            eprintln!("      {} {}", Self::BULLET, path.display());
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("Warning:").yellow().bold(), message);
        }
    }

    pub fn error(&self, err: &InstallerError) {
        eprintln!("{} {}", style("error:").red().bold(), err);
        if let Some(hint) = err.hint() {
            eprintln!("{} {}", style("hint:").cyan(), hint);
        }
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}
