//! Step context and provider traits
//!
//! These traits keep the runner independent of any concrete console,
//! log file, message catalog or terminal.

use crate::confirm::{self, Answer};
use std::io;

/// Named substitution parameters for a message key
pub type Params<'a> = &'a [(&'a str, &'a str)];

/// Logging collaborator
///
/// Implementations decide where messages go (console, file, both) and how
/// they are colored.
pub trait Reporter {
    /// Informational message
    fn info(&self, msg: &str);

    /// Diagnostic message
    fn debug(&self, msg: &str);

    /// Non-fatal problem
    fn warn(&self, msg: &str);

    /// Fatal or near-fatal problem
    fn error(&self, msg: &str);

    /// Announce step `index` of `total`
    fn step(&self, index: usize, total: usize, label: &str);

    /// Report the status token a step returned
    fn status(&self, token: &str);
}

/// Translation collaborator
///
/// Returns the localized text for `key` with `{name}` placeholders filled
/// from `params`. Unknown keys render as the key itself.
pub trait Translate {
    fn t(&self, key: &str, params: Params<'_>) -> String;
}

/// Source of operator input
pub trait LineReader {
    /// Show `prompt` and read one line.
    ///
    /// An interrupt (Ctrl-C) or end of input is reported as an error of
    /// kind [`io::ErrorKind::Interrupted`] or [`io::ErrorKind::UnexpectedEof`].
    fn read_line(&self, prompt: &str) -> io::Result<String>;
}

/// Collaborators handed to every step
pub struct StepContext<'a> {
    pub reporter: &'a dyn Reporter,
    pub i18n: &'a dyn Translate,
    pub input: &'a dyn LineReader,
}

impl<'a> StepContext<'a> {
    /// Create a new step context
    pub fn new(
        reporter: &'a dyn Reporter,
        i18n: &'a dyn Translate,
        input: &'a dyn LineReader,
    ) -> Self {
        Self {
            reporter,
            i18n,
            input,
        }
    }

    /// Translate a key
    pub fn t(&self, key: &str, params: Params<'_>) -> String {
        self.i18n.t(key, params)
    }

    /// Translate and log at info level
    pub fn info(&self, key: &str, params: Params<'_>) {
        self.reporter.info(&self.t(key, params));
    }

    /// Translate and log at debug level
    pub fn debug(&self, key: &str, params: Params<'_>) {
        self.reporter.debug(&self.t(key, params));
    }

    /// Translate and log as a warning, returning the text so callers can
    /// collect it
    pub fn warn(&self, key: &str, params: Params<'_>) -> String {
        let msg = self.t(key, params);
        self.reporter.warn(&msg);
        msg
    }

    /// Translate and log as an error
    pub fn error(&self, key: &str, params: Params<'_>) {
        self.reporter.error(&self.t(key, params));
    }

    /// Ask the operator a yes/no question identified by `prompt_key`
    pub fn confirm(&self, prompt_key: &str) -> Answer {
        confirm::confirm(self.input, self.i18n, prompt_key)
    }
}
