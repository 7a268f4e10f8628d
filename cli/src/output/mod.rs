//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use styles::Styles;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether the output stream is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Write progress to stderr instead of stdout.
    pub to_stderr: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        Self::build(no_color, quiet, false)
    }

    /// Like [`OutputContext::new`], but for a process whose stdout is reserved
    /// for machine-readable output.
    #[must_use]
    pub fn for_stderr(no_color: bool, quiet: bool) -> Self {
        Self::build(no_color, quiet, true)
    }

    fn build(no_color: bool, quiet: bool, to_stderr: bool) -> Self {
        let term = if to_stderr {
            Term::stderr()
        } else {
            Term::stdout()
        };
        let is_tty = term.is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
            to_stderr,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Write one line to the progress stream unless `quiet`.
    pub fn line(&self, text: &str) {
        if self.quiet {
            return;
        }
        if self.to_stderr {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        self.line(&format!("  {} {msg}", "✓".style(self.styles.success)));
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        self.line(&format!("  {} {msg}", "⚠".style(self.styles.warning)));
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        self.line(&format!("  {} {msg}", "ℹ".style(self.styles.info)));
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        self.line(&format!("  {}", msg.style(self.styles.header)));
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        self.line(&format!("  {}  {value}", key.style(self.styles.dim)));
    }
}
